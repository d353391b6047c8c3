// Configuration management
// TOML settings under the configuration directory, plus the interactive setup flow

pub mod interactive;
pub mod settings;

#[cfg(test)]
mod tests;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    CohereConfig, Config, ConfigError, GenerationConfig, IndexBackend, IndexConfig,
    NetworkConfig, OllamaConfig, ProviderKind, RetrievalConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
