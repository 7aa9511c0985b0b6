//! The comic studio session and its generation workflows.
//!
//! A single [`ComicStudio`] owns the [`GenerationSession`] and allows one
//! generation operation at a time (character, whole strip, or one panel).
//! Session locks are never held across a remote call.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    config::StudioSettings,
    error::{ComicError, ComicResult},
    export::export_comic,
    gemini::ImageGenerator,
    models::{
        CharacterReference, CharacterView, GenerateCharacterRequest, GenerateComicRequest,
        ImagePayload, Panel, PanelView, PreferencesUpdate, RunState, SessionView, StylePreset,
        DEFAULT_PANEL_COUNT, MAX_PANEL_COUNT,
    },
    prompts::{build_character_prompt, build_panel_prompt},
    store::{PreferenceStore, StoreKey},
    story::beat_for,
};

const EVENT_CAPACITY: usize = 64;

/// Observations published while the studio works.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComicEvent {
    CharacterReady,
    Progress { completed: usize, total: usize },
    PanelReady { index: usize },
    RunCompleted { run_id: Uuid, total: usize },
    RunFailed { run_id: Uuid, index: usize, message: String },
    RunCancelled { run_id: Uuid, index: usize },
    PanelRegenerated { index: usize },
    PanelRegenerationFailed { index: usize, message: String },
}

impl ComicEvent {
    /// Fraction of the strip finished, for progress bars.
    pub fn progress_fraction(&self) -> Option<f32> {
        match self {
            ComicEvent::Progress { completed, total } if *total > 0 => {
                Some(*completed as f32 / *total as f32)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerationSession {
    pub credential: Option<String>,
    pub character: Option<CharacterReference>,
    pub character_description: String,
    pub style_preset: StylePreset,
    pub scene_description: String,
    pub panel_count: usize,
    pub panels: Vec<Panel>,
    pub run_state: RunState,
    pub regenerating: Option<usize>,
}

impl GenerationSession {
    /// Rebuilds a session from persisted values. Bad values fall back to
    /// defaults instead of failing start-up.
    pub fn rehydrate(store: &PreferenceStore, default_credential: Option<String>) -> Self {
        let credential = store
            .get(StoreKey::ApiKey)
            .filter(|k| !k.trim().is_empty())
            .map(str::to_string)
            .or(default_credential);

        let style_preset = store
            .get(StoreKey::StylePreset)
            .map(|label| {
                StylePreset::from_label(label).unwrap_or_else(|| {
                    warn!("⚠️ Unknown stored style preset {:?}, using default", label);
                    StylePreset::default()
                })
            })
            .unwrap_or_default();

        let panel_count = store
            .get(StoreKey::PanelCount)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| (1..=MAX_PANEL_COUNT).contains(n))
            .unwrap_or(DEFAULT_PANEL_COUNT);

        let character_description = store
            .get(StoreKey::CharacterDescription)
            .unwrap_or_default()
            .to_string();

        let character = store.get(StoreKey::CharacterImage).and_then(|url| {
            match decode_stored_image(url, "character image") {
                Ok(image) => Some(CharacterReference {
                    image,
                    description: character_description.clone(),
                    style_preset,
                    generated_at: Utc::now(),
                }),
                Err(e) => {
                    warn!("⚠️ {}, dropping it", e);
                    None
                }
            }
        });

        Self {
            credential,
            character,
            character_description,
            style_preset,
            scene_description: store.get(StoreKey::SceneDescription).unwrap_or_default().to_string(),
            panel_count,
            panels: Vec::new(),
            run_state: RunState::Idle,
            regenerating: None,
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            has_credential: self.credential.is_some(),
            character_description: self.character_description.clone(),
            style_preset: self.style_preset,
            scene_description: self.scene_description.clone(),
            panel_count: self.panel_count,
            character: self.character.as_ref().map(CharacterView::from),
            panels: self.panels.iter().map(PanelView::from).collect(),
            run_state: self.run_state.clone(),
            regenerating_panel: self.regenerating,
        }
    }
}

pub struct ComicStudio {
    generator: Arc<dyn ImageGenerator>,
    settings: StudioSettings,
    session: RwLock<GenerationSession>,
    store: Mutex<PreferenceStore>,
    events: broadcast::Sender<ComicEvent>,
    busy: AtomicBool,
    cancel_requested: AtomicBool,
}

/// Held for the duration of one generation operation.
struct BusyGuard<'a> {
    studio: &'a ComicStudio,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        {
            let mut session = self.studio.session.write();
            session.regenerating = None;
            // the operation future was dropped mid-run
            if let RunState::Running { run_id, index, .. } = session.run_state {
                session.run_state = RunState::Cancelled { run_id, index };
            }
            // a request aimed at this operation must not stop the next one
            self.studio.cancel_requested.store(false, Ordering::Release);
        }
        self.studio.busy.store(false, Ordering::Release);
    }
}

impl ComicStudio {
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        store: PreferenceStore,
        settings: StudioSettings,
        default_credential: Option<String>,
    ) -> Self {
        let session = GenerationSession::rehydrate(&store, default_credential);
        info!(
            "🎨 Studio ready (credential: {}, character: {}, style: {})",
            session.credential.is_some(),
            session.character.is_some(),
            session.style_preset
        );
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            generator,
            settings,
            session: RwLock::new(session),
            store: Mutex::new(store),
            events,
            busy: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ComicEvent> {
        self.events.subscribe()
    }

    pub fn session_view(&self) -> SessionView {
        self.session.read().view()
    }

    pub fn run_state(&self) -> RunState {
        self.session.read().run_state.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn character_image(&self) -> Option<ImagePayload> {
        self.session.read().character.as_ref().map(|c| c.image.clone())
    }

    pub fn panel_image(&self, index: usize) -> ComicResult<ImagePayload> {
        let session = self.session.read();
        session
            .panels
            .get(index)
            .map(|p| p.image.clone())
            .ok_or(ComicError::IndexOutOfRange { index, len: session.panels.len() })
    }

    /// Applies user edits and persists each changed value.
    pub fn update_preferences(&self, update: PreferencesUpdate) -> ComicResult<SessionView> {
        if let Some(count) = update.panel_count {
            validate_panel_count(count)?;
        }
        let mut session = self.session.write();
        let mut store = self.store.lock();

        if let Some(key) = update.api_key {
            let key = key.trim().to_string();
            if key.is_empty() {
                session.credential = None;
                store.remove(StoreKey::ApiKey)?;
            } else {
                store.set(StoreKey::ApiKey, key.as_str())?;
                session.credential = Some(key);
            }
        }
        if let Some(description) = update.character_description {
            store.set(StoreKey::CharacterDescription, description.as_str())?;
            session.character_description = description;
        }
        if let Some(preset) = update.style_preset {
            store.set(StoreKey::StylePreset, preset.label())?;
            session.style_preset = preset;
        }
        if let Some(scene) = update.scene_description {
            store.set(StoreKey::SceneDescription, scene.as_str())?;
            session.scene_description = scene;
        }
        if let Some(count) = update.panel_count {
            store.set(StoreKey::PanelCount, count.to_string())?;
            session.panel_count = count;
        }
        Ok(session.view())
    }

    /// Asks a running strip to stop before its next panel. Returns whether a
    /// strip was running to receive the request.
    pub fn cancel(&self) -> bool {
        // flag and state change together under the session lock
        let session = self.session.read();
        if !matches!(session.run_state, RunState::Running { .. }) {
            return false;
        }
        self.cancel_requested.store(true, Ordering::Release);
        info!("🛑 Cancellation requested");
        true
    }

    /// Generates the character reference sheet from text alone.
    ///
    /// The previous reference stays in place if the call fails.
    pub async fn generate_character(&self, request: GenerateCharacterRequest) -> ComicResult<CharacterView> {
        let _busy = self.begin()?;

        // validate against the effective inputs before anything is persisted
        let (credential, description, style_preset) = {
            let session = self.session.read();
            let credential = session.credential.clone().ok_or(ComicError::MissingCredential)?;
            let description = request
                .description
                .as_deref()
                .unwrap_or(&session.character_description)
                .trim()
                .to_string();
            (credential, description, request.style_preset.unwrap_or(session.style_preset))
        };
        if description.is_empty() {
            return Err(ComicError::EmptyCharacterDescription);
        }
        self.update_preferences(PreferencesUpdate {
            character_description: request.description,
            style_preset: request.style_preset,
            ..Default::default()
        })?;

        info!("🧑‍🎨 Generating {} character: {}", style_preset, description);
        let prompt = build_character_prompt(&description, style_preset);
        let image = self.generator.generate(&credential, &prompt, None).await.map_err(|e| {
            error!("❌ Character generation failed: {}", e);
            ComicError::from(e)
        })?;

        let character = CharacterReference {
            image,
            description,
            style_preset,
            generated_at: Utc::now(),
        };
        let view = CharacterView::from(&character);
        self.persist(StoreKey::CharacterImage, character.image.to_data_url());
        self.session.write().character = Some(character);
        self.emit(ComicEvent::CharacterReady);
        info!("✅ Character generated ({} bytes)", view.size_bytes);
        Ok(view)
    }

    /// Generates a whole strip, one panel at a time, every panel conditioned on
    /// the original character reference.
    ///
    /// The first failing panel ends the run; panels already produced stay in
    /// the session.
    pub async fn generate_all(&self, request: GenerateComicRequest) -> ComicResult<Vec<PanelView>> {
        let _busy = self.begin()?;

        let (credential, reference, session_count, session_style) = {
            let session = self.session.read();
            let credential = session.credential.clone().ok_or(ComicError::MissingCredential)?;
            let reference = session
                .character
                .as_ref()
                .map(|c| c.image.clone())
                .ok_or(ComicError::MissingCharacterReference)?;
            (credential, reference, session.panel_count, session.style_preset)
        };
        let scene = request.scene_description.trim().to_string();
        if scene.is_empty() {
            return Err(ComicError::EmptySceneDescription);
        }
        let panel_count = request.panel_count.unwrap_or(session_count);
        validate_panel_count(panel_count)?;
        let style_preset = request.style_preset.unwrap_or(session_style);

        self.persist(StoreKey::SceneDescription, scene.clone());
        self.persist(StoreKey::PanelCount, panel_count.to_string());
        self.persist(StoreKey::StylePreset, style_preset.label().to_string());

        let run_id = Uuid::new_v4();
        {
            let mut session = self.session.write();
            session.scene_description = scene.clone();
            session.panel_count = panel_count;
            session.style_preset = style_preset;
            session.panels.clear();
            session.run_state = RunState::Running { run_id, index: 0, total: panel_count };
        }
        info!(%run_id, "🚀 Generating {}-panel {} comic: {}", panel_count, style_preset, scene);

        for index in 0..panel_count {
            if self.cancel_requested.swap(false, Ordering::AcqRel) {
                info!(%run_id, "🛑 Run cancelled before panel {}", index + 1);
                self.session.write().run_state = RunState::Cancelled { run_id, index };
                self.emit(ComicEvent::RunCancelled { run_id, index });
                return Err(ComicError::Cancelled { index });
            }
            self.session.write().run_state = RunState::Running { run_id, index, total: panel_count };

            let beat = beat_for(index, panel_count);
            let prompt = build_panel_prompt(index, panel_count, &scene, beat, style_preset);
            info!(%run_id, "🎯 Generating panel {} of {} ({})", index + 1, panel_count, beat.caption());

            match self.generator.generate(&credential, &prompt, Some(&reference)).await {
                Ok(image) => {
                    self.session.write().panels.push(Panel::new(index, image, beat));
                    self.emit(ComicEvent::PanelReady { index });
                }
                Err(e) => {
                    error!(%run_id, "❌ Panel {} failed: {}", index + 1, e);
                    let message = e.to_string();
                    self.session.write().run_state = RunState::Failed { run_id, index, message: message.clone() };
                    self.emit(ComicEvent::RunFailed { run_id, index, message });
                    return Err(e.into());
                }
            }

            self.emit(ComicEvent::Progress { completed: index + 1, total: panel_count });
            if index + 1 < panel_count && !self.settings.panel_delay.is_zero() {
                tokio::time::sleep(self.settings.panel_delay).await;
            }
        }

        let panels = {
            let mut session = self.session.write();
            session.run_state = RunState::Completed { run_id, total: panel_count };
            session.panels.iter().map(PanelView::from).collect()
        };
        self.emit(ComicEvent::RunCompleted { run_id, total: panel_count });
        info!(%run_id, "✅ Comic strip generated with {} panels", panel_count);
        Ok(panels)
    }

    /// Replaces a single panel in place. On failure the panel keeps its
    /// previous image, beat and caption.
    pub async fn regenerate_panel(&self, index: usize) -> ComicResult<PanelView> {
        let _busy = self.begin()?;

        let (credential, reference, scene, style_preset, len) = {
            let session = self.session.read();
            let credential = session.credential.clone().ok_or(ComicError::MissingCredential)?;
            let reference = session
                .character
                .as_ref()
                .map(|c| c.image.clone())
                .ok_or(ComicError::MissingCharacterReference)?;
            let len = session.panels.len();
            if index >= len {
                return Err(ComicError::IndexOutOfRange { index, len });
            }
            (credential, reference, session.scene_description.clone(), session.style_preset, len)
        };
        self.session.write().regenerating = Some(index);

        let beat = beat_for(index, len);
        let prompt = build_panel_prompt(index, len, &scene, beat, style_preset);
        info!("🔄 Regenerating panel {} of {} ({})", index + 1, len, beat.caption());

        match self.generator.generate(&credential, &prompt, Some(&reference)).await {
            Ok(image) => {
                let view = {
                    let mut session = self.session.write();
                    let len = session.panels.len();
                    let slot = session
                        .panels
                        .get_mut(index)
                        .ok_or(ComicError::IndexOutOfRange { index, len })?;
                    *slot = Panel::new(index, image, beat);
                    PanelView::from(&*slot)
                };
                self.emit(ComicEvent::PanelRegenerated { index });
                info!("✅ Panel {} regenerated", index + 1);
                Ok(view)
            }
            Err(e) => {
                error!("❌ Error regenerating panel {}: {}", index + 1, e);
                self.emit(ComicEvent::PanelRegenerationFailed { index, message: e.to_string() });
                Err(e.into())
            }
        }
    }

    /// Zips the current panels with their metadata. Refused while a generation
    /// is in flight so a half-built strip is never packaged.
    pub fn export(&self) -> ComicResult<Vec<u8>> {
        if self.is_busy() {
            warn!("⏳ Rejected export: a generation is still running");
            return Err(ComicError::GenerationInProgress);
        }
        let (panels, description, style_preset) = {
            let session = self.session.read();
            (session.panels.clone(), session.character_description.clone(), session.style_preset)
        };
        Ok(export_comic(&panels, &description, style_preset, Utc::now())?)
    }

    fn begin(&self) -> ComicResult<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                warn!("⏳ Rejected request: a generation is already running");
                ComicError::GenerationInProgress
            })?;
        Ok(BusyGuard { studio: self })
    }

    fn emit(&self, event: ComicEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn persist(&self, key: StoreKey, value: String) {
        if let Err(e) = self.store.lock().set(key, value) {
            warn!("⚠️ Could not persist {}: {}", key.as_str(), e);
        }
    }
}

fn decode_stored_image(url: &str, what: &'static str) -> ComicResult<ImagePayload> {
    ImagePayload::from_data_url(url).ok_or(ComicError::InvalidImageData { what })
}

fn validate_panel_count(count: usize) -> ComicResult<()> {
    if (1..=MAX_PANEL_COUNT).contains(&count) {
        Ok(())
    } else {
        Err(ComicError::InvalidPanelCount { requested: count, max: MAX_PANEL_COUNT })
    }
}
