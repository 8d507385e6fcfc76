pub mod loader;
pub mod schema;

pub use loader::{find_config_path, load_config, load_config_from_str, validate_config};
pub use schema::{
    AuthConfig, Config, DatabaseConfig, EnginesConfig, EventPrompt, LogFormat, LoggingConfig,
    PromptsConfig, ServerConfig, SpeechSynthesizerConfig, StorageConfig, TextGeneratorConfig,
};
