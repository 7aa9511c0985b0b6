use std::io::{Cursor, Write};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::models::{Panel, StylePreset};

pub const METADATA_ENTRY: &str = "comic-metadata.json";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no comic to export")]
    EmptySequence,
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("archive write error: {0}")]
    Io(#[from] std::io::Error),
    #[error("metadata encoding error: {0}")]
    Metadata(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComicMetadata {
    pub character_description: String,
    pub style_preset: StylePreset,
    pub panel_count: usize,
    pub generated_date: String,
    pub story_beats: Vec<String>,
}

/// Archive entry name for a zero-based panel index, e.g. `panel-1.png`.
pub fn panel_entry_name(panel: &Panel) -> String {
    format!("panel-{}.{}", panel.index + 1, panel.image.file_extension())
}

/// Packs the panels and a metadata document into a zip archive.
///
/// Panel bytes are stored as-is. The metadata reflects `panels` exactly as
/// passed, so regenerated panels report their current beat.
pub fn export_comic(
    panels: &[Panel],
    character_description: &str,
    style_preset: StylePreset,
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, ExportError> {
    if panels.is_empty() {
        return Err(ExportError::EmptySequence);
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for panel in panels {
        zip.start_file(panel_entry_name(panel), stored)?;
        zip.write_all(&panel.image.bytes)?;
    }

    let metadata = ComicMetadata {
        character_description: character_description.to_string(),
        style_preset,
        panel_count: panels.len(),
        generated_date: generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        story_beats: panels.iter().map(|p| p.story_beat.text()).collect(),
    };
    zip.start_file(METADATA_ENTRY, SimpleFileOptions::default())?;
    zip.write_all(serde_json::to_string_pretty(&metadata)?.as_bytes())?;

    let cursor = zip.finish()?;
    tracing::info!("📦 Exported {} panels ({} bytes)", panels.len(), cursor.get_ref().len());
    Ok(cursor.into_inner())
}
