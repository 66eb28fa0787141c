//! Configuration loading and validation tests

#[cfg(test)]
mod tests {
    use super::super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    #[serial]
    fn test_empty_config_uses_defaults() {
        let config = ConfigLoader::from_str("").unwrap();
        assert_eq!(config.llm.provider, LlmProvider::OpenAI);
        assert_eq!(config.llm.parameters, ModelParameters::default());
        assert_eq!(config.llm.parameters.context_length, 4000);
        assert_eq!(config.actions.affirmations, vec!["yes", "confirm"]);
        assert_eq!(config.actions.default_new_file, "new-file.md");
        assert!(!config.actions.confirm_writes);
        assert_eq!(config.logging.file, std::path::PathBuf::from("quill.log"));
    }

    #[test]
    #[serial]
    fn test_full_config() {
        let yaml = r#"
llm:
  provider: custom
  base_url: http://localhost:8080/v1
  model: local-model
  streaming: false
  parameters:
    context_length: 8000
    max_tokens: 512
    temperature: 0.2
  auth:
    api_key: secret
vault:
  root: /tmp/notes
sessions:
  dir: /tmp/sessions
actions:
  confirm_writes: true
  affirmations: [yes, "go ahead"]
  match_threshold: 0.7
logging:
  level: debug
"#;
        let config = ConfigLoader::from_str(yaml).unwrap();
        assert_eq!(config.llm.provider, LlmProvider::Custom);
        assert_eq!(config.llm.base_url.as_deref(), Some("http://localhost:8080/v1"));
        assert!(!config.llm.streaming);
        assert_eq!(config.llm.parameters.max_tokens, 512);
        assert_eq!(config.llm.auth.api_key.as_deref(), Some("secret"));
        assert!(config.actions.confirm_writes);
        assert_eq!(config.actions.affirmations, vec!["yes", "go ahead"]);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    #[serial]
    fn test_validation_failures() {
        let cases = [
            "llm: { model: '' }",
            "llm: { parameters: { context_length: 0 } }",
            "llm: { parameters: { temperature: 2.5 } }",
            "llm: { provider: custom }",
            "llm: { provider: custom, base_url: '' }",
            "actions: { match_threshold: 1.0 }",
            "actions: { match_threshold: 0 }",
            "actions: { affirmations: [] }",
            "vault: { extension: '.md' }",
            "logging: { level: loud }",
        ];
        for yaml in cases {
            let result = ConfigLoader::from_str(yaml);
            assert!(
                matches!(result, Err(QuillError::ConfigError(_))),
                "expected config error for {}",
                yaml
            );
        }
    }

    #[test]
    #[serial]
    fn test_invalid_yaml() {
        assert!(matches!(
            ConfigLoader::from_str("llm: [unclosed"),
            Err(QuillError::ConfigError(_))
        ));
    }

    #[test]
    #[serial]
    fn test_api_key_env_resolution() {
        std::env::set_var("QUILL_TEST_KEY", "from-env");
        let config = ConfigLoader::from_str("llm: { auth: { api_key_env: QUILL_TEST_KEY } }").unwrap();
        assert_eq!(config.llm.auth.api_key.as_deref(), Some("from-env"));
        std::env::remove_var("QUILL_TEST_KEY");
    }

    #[test]
    #[serial]
    fn test_provider_key_fallback() {
        std::env::set_var("GROQ_API_KEY", "groq-key");
        let config = ConfigLoader::from_str("llm: { provider: groq, model: llama3-8b-8192 }").unwrap();
        assert_eq!(config.llm.auth.api_key.as_deref(), Some("groq-key"));
        std::env::remove_var("GROQ_API_KEY");
    }

    #[tokio::test]
    #[serial]
    async fn test_from_file_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".env"), "QUILL_FILE_KEY=\"file-key\"\n# comment\n").unwrap();
        let config_path = dir.path().join("quill.yaml");
        std::fs::write(
            &config_path,
            "vault: { root: notes }\nenvironment: { env_files: [.env] }\nllm: { auth: { api_key_env: QUILL_FILE_KEY } }\n",
        )
        .unwrap();

        let config = ConfigLoader::from_file(&config_path).await.unwrap();
        assert_eq!(config.vault.root, dir.path().join("notes"));
        assert_eq!(config.llm.auth.api_key.as_deref(), Some("file-key"));
        std::env::remove_var("QUILL_FILE_KEY");
    }

    #[tokio::test]
    #[serial]
    async fn test_load_config_missing_file() {
        let result = load_config("/definitely/not/here.yaml").await;
        assert!(matches!(result, Err(QuillError::ConfigError(_))));
    }

    #[tokio::test]
    #[serial]
    async fn test_load_config_from_temp_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "llm:\n  model: gpt-4o\n  auth:\n    api_key: k").unwrap();
        let config = load_config(file.path()).await.unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert!(validate_config(&config).is_ok());
    }
}
