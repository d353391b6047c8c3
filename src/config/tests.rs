use super::*;
use std::fs;
use tempfile::TempDir;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn config_file_persistence() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_path = temp_dir.path().join("config.toml");

        let original_config = Config {
            provider: ProviderKind::Ollama,
            ollama: OllamaConfig {
                protocol: "https".to_string(),
                host: "test-host".to_string(),
                port: 8080,
                embed_model: "test-embed".to_string(),
                chat_model: "test-chat".to_string(),
                ..OllamaConfig::default()
            },
            index: IndexConfig {
                backend: IndexBackend::Lancedb,
                collection: "papers".to_string(),
                dimension: 768,
            },
            ..Config::default()
        };

        let toml_content = toml::to_string_pretty(&original_config)
            .expect("config should convert to toml string successfully");
        fs::write(&config_path, toml_content).expect("should write to config_path successfully");

        let content =
            fs::read_to_string(&config_path).expect("should read from config_path successfully");
        let loaded_config: Config = toml::from_str(&content).expect("should parse toml correctly");

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn invalid_toml_handling() {
        let invalid_toml = r#"
            [ollama
            host = "localhost"
            port = "invalid_port"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let result: Result<Config, toml::de::Error> = toml::from_str("provider = \"openai\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn partial_config_with_defaults() {
        let partial_toml = r#"
            [ollama]
            host = "custom-host"
        "#;

        let config: Config = toml::from_str(partial_toml).expect("missing fields use defaults");
        assert_eq!(config.ollama.host, "custom-host");
        assert_eq!(config.ollama.port, 11434);
        assert_eq!(config.provider, ProviderKind::Cohere);
        assert_eq!(config.retrieval, RetrievalConfig::default());
    }

    #[test]
    fn complete_valid_config() {
        let valid_toml = r#"
            provider = "cohere"

            [cohere]
            base_url = "https://api.cohere.com"
            embed_model = "embed-english-v3.0"
            chat_model = "command-r-plus"
            api_key_env = "MY_COHERE_KEY"

            [index]
            backend = "memory"
            collection = "text_embeddings"
            dimension = 1024

            [retrieval]
            chunk_size = 250
            top_k = 5
            context_char_budget = 4000
            history_window = 3

            [generation]
            max_tokens = 512
            temperature = 0.2

            [network]
            timeout_seconds = 60
            retry_attempts = 2
        "#;

        let config: Config = toml::from_str(valid_toml).expect("should parse toml successfully");
        assert_eq!(config.cohere.chat_model, "command-r-plus");
        assert_eq!(config.cohere.api_key_env, "MY_COHERE_KEY");
        assert_eq!(config.retrieval.chunk_size, 250);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.history_window, 3);
        assert_eq!(config.generation.max_tokens, 512);
        assert_eq!(config.network.retry_attempts, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_from_directory_sets_base_dir() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        fs::write(
            temp_dir.path().join("config.toml"),
            "[index]\nbackend = \"lancedb\"\n",
        )
        .expect("should write config");

        let config = Config::load(temp_dir.path()).expect("should load config");
        assert_eq!(config.get_base_dir(), temp_dir.path());
        assert_eq!(config.vector_database_path(), temp_dir.path().join("vectors"));
    }

    #[test]
    fn out_of_range_values_fail_to_load() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        fs::write(
            temp_dir.path().join("config.toml"),
            "[generation]\ntemperature = 3.5\n",
        )
        .expect("should write config");

        assert!(Config::load(temp_dir.path()).is_err());
    }

    #[test]
    fn port_boundary_validation() {
        let mut config = OllamaConfig::default();

        assert!(config.set_port(1).is_ok());
        assert!(config.set_port(65535).is_ok());
        assert!(config.set_port(0).is_err());
    }

    #[test]
    fn dimension_boundary_validation() {
        let mut config = IndexConfig::default();

        assert!(config.set_dimension(64).is_ok());
        assert!(config.set_dimension(4096).is_ok());
        assert!(config.set_dimension(63).is_err());
        assert!(config.set_dimension(4097).is_err());
        assert_eq!(config.dimension, 4096);
    }

    #[test]
    fn ollama_url_generation_with_different_hosts() {
        let configs = vec![
            ("http", "localhost", 11434, "http://localhost:11434/"),
            ("http", "127.0.0.1", 8080, "http://127.0.0.1:8080/"),
            ("http", "example.com", 3000, "http://example.com:3000/"),
            (
                "https",
                "secure.example.com",
                443,
                "https://secure.example.com/",
            ),
        ];

        for (protocol, host, port, expected_url) in configs {
            let ollama = OllamaConfig {
                protocol: protocol.to_string(),
                host: host.to_string(),
                port,
                ..OllamaConfig::default()
            };

            let url = ollama.ollama_url().expect("ollama_url is ok");
            assert_eq!(url.as_str(), expected_url);
        }
    }

    #[test]
    fn model_name_validation() {
        let mut config = CohereConfig::default();

        assert!(config.set_embed_model("embed-multilingual-v3.0".to_string()).is_ok());
        assert!(config.set_chat_model("command-r".to_string()).is_ok());
        assert!(config.set_chat_model(String::new()).is_err());
        assert!(config.set_embed_model("   ".to_string()).is_err());
    }

    #[test]
    fn error_display_messages() {
        let errors = vec![
            ConfigError::InvalidProtocol("ftp".to_string()),
            ConfigError::InvalidPort(0),
            ConfigError::InvalidTopK(0),
            ConfigError::InvalidModel(String::new()),
            ConfigError::InvalidUrl("invalid-url".to_string()),
            ConfigError::MissingCredential("COHERE_API_KEY".to_string()),
        ];

        for error in errors {
            let message = format!("{error}");
            assert!(!message.is_empty());
            assert!(message.len() > 10);
        }
    }

    #[test]
    fn config_dir_is_under_home() {
        let dir = get_config_dir().expect("config dir should resolve");
        assert!(dir.ends_with(".doc-chat") || dir.ends_with("doc-chat"));
    }
}
