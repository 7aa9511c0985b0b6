//! Scripted image generator for studio tests.

#![allow(dead_code)]

use async_trait::async_trait;
use comic_studio::{
    models::ImagePayload, store::PreferenceStore, ComicStudio, GenerationError, ImageGenerator,
    StudioSettings,
};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{sync::Notify, time::Instant};

pub const TEST_KEY: &str = "test-key";

/// How a given call (numbered from 0) should fail.
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Request,
    NoImage,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub credential: String,
    pub prompt: String,
    pub reference: Option<ImagePayload>,
    pub at: Instant,
}

/// Succeeds with `image-<n>` bytes for call `n` unless told otherwise.
#[derive(Default)]
pub struct ScriptedGenerator {
    failures: Mutex<HashMap<usize, Failure>>,
    calls: Mutex<Vec<RecordedCall>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(call: usize, failure: Failure) -> Self {
        let generator = Self::default();
        generator.fail_on(call, failure);
        generator
    }

    /// Every call waits for a `notify_one` on the returned handle.
    pub fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        (Self { gate: Some(gate.clone()), ..Self::default() }, gate)
    }

    pub fn fail_on(&self, call: usize, failure: Failure) {
        self.failures.lock().insert(call, failure);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn image_for_call(call: usize) -> ImagePayload {
        ImagePayload::new(format!("image-{call}").into_bytes(), "image/png")
    }
}

#[async_trait]
impl ImageGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        credential: &str,
        prompt: &str,
        reference: Option<&ImagePayload>,
    ) -> Result<ImagePayload, GenerationError> {
        let call = {
            let mut calls = self.calls.lock();
            calls.push(RecordedCall {
                credential: credential.to_string(),
                prompt: prompt.to_string(),
                reference: reference.cloned(),
                at: Instant::now(),
            });
            calls.len() - 1
        };
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match self.failures.lock().get(&call) {
            Some(Failure::Request) => Err(GenerationError::RequestFailed("status=429 quota".into())),
            Some(Failure::NoImage) => Err(GenerationError::NoImageProduced),
            None => Ok(Self::image_for_call(call)),
        }
    }
}

pub fn settings() -> StudioSettings {
    StudioSettings { panel_delay: Duration::ZERO }
}

pub fn character_image() -> ImagePayload {
    ImagePayload::new(b"reference-sheet".to_vec(), "image/png")
}

/// A studio with a credential and a character reference already in place.
pub fn ready_studio(generator: Arc<ScriptedGenerator>) -> ComicStudio {
    ready_studio_with(generator, settings())
}

pub fn ready_studio_with(generator: Arc<ScriptedGenerator>, settings: StudioSettings) -> ComicStudio {
    use comic_studio::store::StoreKey;
    let mut store = PreferenceStore::in_memory();
    store.set(StoreKey::ApiKey, TEST_KEY).unwrap();
    store.set(StoreKey::CharacterDescription, "A lanky space pirate with a parrot drone").unwrap();
    store.set(StoreKey::CharacterImage, character_image().to_data_url()).unwrap();
    ComicStudio::new(generator, store, settings, None)
}

pub fn bare_studio(generator: Arc<ScriptedGenerator>) -> ComicStudio {
    ComicStudio::new(generator, PreferenceStore::in_memory(), settings(), None)
}
