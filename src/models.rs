use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::story::StoryBeat;

pub const DEFAULT_PANEL_COUNT: usize = 4;
pub const MAX_PANEL_COUNT: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StylePreset {
    #[default]
    #[serde(rename = "Modern Comic")]
    ModernComic,
    #[serde(rename = "Noir")]
    Noir,
    #[serde(rename = "Manga")]
    Manga,
    #[serde(rename = "Golden Age")]
    GoldenAge,
    #[serde(rename = "Digital Art")]
    DigitalArt,
    #[serde(rename = "Cartoon")]
    Cartoon,
}

impl StylePreset {
    pub const ALL: [StylePreset; 6] = [
        StylePreset::ModernComic,
        StylePreset::Noir,
        StylePreset::Manga,
        StylePreset::GoldenAge,
        StylePreset::DigitalArt,
        StylePreset::Cartoon,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            StylePreset::ModernComic => "Modern Comic",
            StylePreset::Noir => "Noir",
            StylePreset::Manga => "Manga",
            StylePreset::GoldenAge => "Golden Age",
            StylePreset::DigitalArt => "Digital Art",
            StylePreset::Cartoon => "Cartoon",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.label() == label.trim())
    }
}

impl std::fmt::Display for StylePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Raw image bytes plus their MIME type.
///
/// Base64 only appears at the edges (provider wire format, persisted data URLs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Bytes,
    pub mime_type: String,
}

impl ImagePayload {
    pub fn new(bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self { bytes: bytes.into(), mime_type: mime_type.into() }
    }

    pub fn from_base64(data: &str, mime_type: &str) -> Result<Self, base64::DecodeError> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(data.trim())?;
        Ok(Self::new(bytes, mime_type))
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    /// `data:<mime>;base64,<payload>`
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    /// Parses a `data:<mime>;base64,<payload>` string. Returns `None` when the
    /// header is malformed or the payload is not valid base64.
    pub fn from_data_url(url: &str) -> Option<Self> {
        let rest = url.strip_prefix("data:")?;
        let (header, data) = rest.split_once(',')?;
        let mime_type = header.strip_suffix(";base64")?;
        if mime_type.is_empty() {
            return None;
        }
        Self::from_base64(data, mime_type).ok()
    }

    pub fn file_extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct CharacterReference {
    pub image: ImagePayload,
    pub description: String,
    pub style_preset: StylePreset,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Panel {
    pub index: usize,
    pub image: ImagePayload,
    pub story_beat: StoryBeat,
    pub caption: String,
    pub last_updated: DateTime<Utc>,
}

impl Panel {
    pub fn new(index: usize, image: ImagePayload, story_beat: StoryBeat) -> Self {
        Self {
            index,
            image,
            story_beat,
            caption: story_beat.caption(),
            last_updated: Utc::now(),
        }
    }

    /// Accessible description, e.g. `Comic panel 2: INCITING INCIDENT`.
    pub fn alt_text(&self) -> String {
        format!("Comic panel {}: {}", self.index + 1, self.caption)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Running { run_id: Uuid, index: usize, total: usize },
    Completed { run_id: Uuid, total: usize },
    Failed { run_id: Uuid, index: usize, message: String },
    Cancelled { run_id: Uuid, index: usize },
}

// --- Commands from the presentation boundary ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCharacterRequest {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub style_preset: Option<StylePreset>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateComicRequest {
    pub scene_description: String,
    #[serde(default)]
    pub panel_count: Option<usize>,
    #[serde(default)]
    pub style_preset: Option<StylePreset>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesUpdate {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub character_description: Option<String>,
    #[serde(default)]
    pub style_preset: Option<StylePreset>,
    #[serde(default)]
    pub scene_description: Option<String>,
    #[serde(default)]
    pub panel_count: Option<usize>,
}

// --- Views handed back to the presentation boundary ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterView {
    pub description: String,
    pub style_preset: StylePreset,
    pub mime_type: String,
    pub size_bytes: usize,
    pub generated_at: DateTime<Utc>,
}

impl From<&CharacterReference> for CharacterView {
    fn from(c: &CharacterReference) -> Self {
        Self {
            description: c.description.clone(),
            style_preset: c.style_preset,
            mime_type: c.image.mime_type.clone(),
            size_bytes: c.image.len(),
            generated_at: c.generated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelView {
    pub index: usize,
    pub caption: String,
    pub alt_text: String,
    pub story_beat: String,
    pub mime_type: String,
    pub last_updated: DateTime<Utc>,
}

impl From<&Panel> for PanelView {
    fn from(p: &Panel) -> Self {
        Self {
            index: p.index,
            caption: p.caption.clone(),
            alt_text: p.alt_text(),
            story_beat: p.story_beat.text(),
            mime_type: p.image.mime_type.clone(),
            last_updated: p.last_updated,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub has_credential: bool,
    pub character_description: String,
    pub style_preset: StylePreset,
    pub scene_description: String,
    pub panel_count: usize,
    pub character: Option<CharacterView>,
    pub panels: Vec<PanelView>,
    pub run_state: RunState,
    pub regenerating_panel: Option<usize>,
}
