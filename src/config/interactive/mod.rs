
use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{CohereConfig, Config, ConfigError, IndexBackend, OllamaConfig, ProviderKind};
use crate::embeddings::{CohereEmbedder, OllamaEmbedder};

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Doc Chat Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir);

    let providers = &["cohere", "ollama"];
    let provider_index = Select::new()
        .with_prompt("Model provider")
        .default(match config.provider {
            ProviderKind::Cohere => 0,
            ProviderKind::Ollama => 1,
        })
        .items(providers)
        .interact()?;
    config.provider = if provider_index == 0 {
        ProviderKind::Cohere
    } else {
        ProviderKind::Ollama
    };

    eprintln!();
    match config.provider {
        ProviderKind::Cohere => {
            eprintln!("{}", style("Cohere Configuration").bold().yellow());
            eprintln!("The API key is read from an environment variable (or a .env file).");
            eprintln!();
            configure_cohere(&mut config.cohere)?;
        }
        ProviderKind::Ollama => {
            eprintln!("{}", style("Ollama Configuration").bold().yellow());
            eprintln!("Configure your local Ollama instance for embeddings and answers.");
            eprintln!();
            configure_ollama(&mut config.ollama)?;
        }
    }

    eprintln!();
    configure_index(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());
    match test_connection(&config) {
        Ok(detail) => {
            eprintln!("{}", style(format!("✓ {}", detail)).green());
        }
        Err(e) => {
            eprintln!(
                "{}",
                style(format!("⚠ Warning: connection test failed: {}", e)).yellow()
            );
            eprintln!("You can continue, but questions will fail until this is fixed.");
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();
    eprintln!("Provider: {}", style(provider_name(config.provider)).cyan());
    eprintln!();

    eprintln!("{}", style("Cohere Settings:").bold().yellow());
    match config.cohere.api_url() {
        Ok(url) => eprintln!("  API URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  API URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  Embedding model: {}", style(&config.cohere.embed_model).cyan());
    eprintln!("  Chat model: {}", style(&config.cohere.chat_model).cyan());
    let key_state = if config.cohere_api_key().is_ok() {
        style("set").green()
    } else {
        style("not set").red()
    };
    eprintln!(
        "  API key variable: {} ({})",
        style(&config.cohere.api_key_env).cyan(),
        key_state
    );

    eprintln!();
    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    match config.ollama.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  Embedding model: {}", style(&config.ollama.embed_model).cyan());
    eprintln!("  Chat model: {}", style(&config.ollama.chat_model).cyan());

    eprintln!();
    eprintln!("{}", style("Index Settings:").bold().yellow());
    eprintln!("  Backend: {}", style(backend_name(config.index.backend)).cyan());
    eprintln!("  Collection: {}", style(&config.index.collection).cyan());
    eprintln!("  Dimension: {}", style(config.index.dimension).cyan());
    if config.index.backend == IndexBackend::Lancedb {
        eprintln!(
            "  Location: {}",
            style(config.vector_database_path().display()).cyan()
        );
    }

    eprintln!();
    eprintln!("{}", style("Retrieval & Generation:").bold().yellow());
    eprintln!("  Chunk size: {} words", style(config.retrieval.chunk_size).cyan());
    eprintln!("  Top-k: {}", style(config.retrieval.top_k).cyan());
    eprintln!(
        "  Context budget: {} chars",
        style(config.retrieval.context_char_budget).cyan()
    );
    eprintln!("  History window: {} turns", style(config.retrieval.history_window).cyan());
    eprintln!("  Max tokens: {}", style(config.generation.max_tokens).cyan());
    eprintln!("  Temperature: {}", style(config.generation.temperature).cyan());
    eprintln!(
        "  Timeout: {}s, attempts: {}",
        style(config.network.timeout_seconds).cyan(),
        style(config.network.retry_attempts).cyan()
    );

    eprintln!();
    eprintln!("Config file: {}", style(config.config_file_path().display()).dim());

    Ok(())
}

const fn provider_name(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::Cohere => "cohere",
        ProviderKind::Ollama => "ollama",
    }
}

const fn backend_name(backend: IndexBackend) -> &'static str {
    match backend {
        IndexBackend::Memory => "memory (discarded on exit)",
        IndexBackend::Lancedb => "lancedb (on disk)",
    }
}

fn load_existing_config(config_dir: &Path) -> Config {
    if !config_dir.join("config.toml").exists() {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
        return Config {
            base_dir: config_dir.to_path_buf(),
            ..Config::default()
        };
    }

    Config::load(config_dir).unwrap_or_else(|e| {
        eprintln!(
            "{}",
            style(format!("Existing configuration is invalid ({:#}). Using defaults.", e))
                .yellow()
        );
        Config {
            base_dir: config_dir.to_path_buf(),
            ..Config::default()
        }
    })
}

#[expect(
    clippy::ptr_arg,
    reason = "dialoguer validators receive the input type by reference"
)]
fn non_empty(input: &String) -> Result<(), &'static str> {
    if input.trim().is_empty() {
        Err("Value cannot be empty")
    } else {
        Ok(())
    }
}

fn configure_cohere(cohere: &mut CohereConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("Cohere API URL")
        .default(cohere.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let candidate = CohereConfig {
                base_url: input.clone(),
                ..CohereConfig::default()
            };
            candidate.api_url().map(|_| ())
        })
        .interact_text()?;

    let embed_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(cohere.embed_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(cohere.chat_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let api_key_env: String = Input::new()
        .with_prompt("Environment variable holding the API key")
        .default(cohere.api_key_env.clone())
        .validate_with(non_empty)
        .interact_text()?;

    cohere.set_base_url(base_url)?;
    cohere.set_embed_model(embed_model)?;
    cohere.set_chat_model(chat_model)?;
    cohere.set_api_key_env(api_key_env)?;

    Ok(())
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols
        .get(protocol_index)
        .copied()
        .unwrap_or("http")
        .to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let candidate = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            candidate.validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let embed_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.embed_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(ollama.chat_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_embed_model(embed_model)?;
    ollama.set_chat_model(chat_model)?;

    Ok(())
}

fn configure_index(config: &mut Config) -> Result<()> {
    eprintln!("{}", style("Vector Index").bold().yellow());

    let backends = &["memory (discarded on exit)", "lancedb (kept on disk)"];
    let backend_index = Select::new()
        .with_prompt("Index backend")
        .default(usize::from(config.index.backend == IndexBackend::Lancedb))
        .items(backends)
        .interact()?;
    config.index.backend = if backend_index == 0 {
        IndexBackend::Memory
    } else {
        IndexBackend::Lancedb
    };

    let dimension: u32 = Input::new()
        .with_prompt("Embedding dimension (must match the embedding model)")
        .default(config.index.dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (64..=4096).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 64 and 4096")
            }
        })
        .interact_text()?;
    config.index.set_dimension(dimension)?;

    Ok(())
}

/// Probe the selected provider; the message describes what succeeded
fn test_connection(config: &Config) -> Result<String> {
    match config.provider {
        ProviderKind::Cohere => {
            let embedder = CohereEmbedder::new(config)?;
            let models = embedder.health_check()?;
            Ok(format!("Cohere reachable, {} models available", models.len()))
        }
        ProviderKind::Ollama => {
            let embedder = OllamaEmbedder::new(config)?;
            embedder.require_models(&[
                config.ollama.embed_model.as_str(),
                config.ollama.chat_model.as_str(),
            ])?;
            Ok(format!(
                "Ollama reachable, models {} and {} are installed",
                config.ollama.embed_model, config.ollama.chat_model
            ))
        }
    }
}
