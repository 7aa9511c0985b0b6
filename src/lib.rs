//! Comic Studio: a character reference sheet and a multi-panel comic strip,
//! generated through Gemini image models.
//!
//! - `prompts`: prompt templates sharing one constraint block.
//! - `story`: narrative beat for each panel position.
//! - `gemini`: the remote image-generation client.
//! - `studio`: session state and the generation workflows.
//! - `export`: zip packaging of finished panels.
//! - `store`: key/value persistence between runs.
//! - `routes`: the HTTP surface.
pub mod config;
pub mod error;
pub mod export;
pub mod gemini;
pub mod models;
pub mod prompts;
pub mod routes;
pub mod store;
pub mod story;
pub mod studio;

pub use config::{AppConfig, StudioSettings};
pub use error::{ComicError, ComicResult};
pub use gemini::{GeminiClient, GenerationError, ImageGenerator};
pub use studio::{ComicEvent, ComicStudio, GenerationSession};
