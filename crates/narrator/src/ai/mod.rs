//! Inference engines and the registry that decides which ones are active.

pub mod engine;
pub mod http;
pub mod model_registry;

pub use engine::{
    Engine, EngineError, Generation, SpeechOutput, SpeechSynthesizer, TextGenerator,
};
pub use http::{HttpSpeechSynthesizer, HttpTextGenerator};
pub use model_registry::{EngineSlot, HotSwapGuard, ModelRegistry};
