use bb_code_search::load_config::{load_credentials, load_settings, resolve_workspace};
use bb_code_search_core::llm::LlmProvider;
use serial_test::serial;
use std::env;
use std::fs::write;
use std::time::Duration;
use tempfile::{tempdir, NamedTempFile};

const OVERRIDE_VARS: &[&str] = &[
    "LLM_PROVIDER",
    "LLM_BASE_URL",
    "LLM_API_KEY",
    "BITBUCKET_API_URL",
];

fn clear_overrides() {
    for var in OVERRIDE_VARS {
        env::remove_var(var);
    }
}

/// Without a settings file every value falls back to its default.
#[test]
#[serial]
fn test_load_settings_defaults_without_file() {
    clear_overrides();

    let settings = load_settings(None).expect("Defaults should load");

    assert_eq!(settings.llm.provider, LlmProvider::Ollama);
    assert_eq!(settings.llm.base_url, "http://localhost:11434");
    assert!(settings.llm.api_key.is_none());
    assert_eq!(settings.bitbucket.api_url, "https://api.bitbucket.org");
    assert_eq!(settings.bitbucket.pagelen, None);
    assert_eq!(settings.template.version, "v1");
}

/// A full settings file, including a relative prompt template path.
#[test]
#[serial]
fn test_load_settings_from_yaml_with_template() {
    clear_overrides();
    let dir = tempdir().expect("temp dir");
    write(dir.path().join("prompt.txt"), "Return JSON with search_term only.").unwrap();
    let config_path = dir.path().join("settings.yaml");
    write(
        &config_path,
        r#"
llm:
  provider: openai
  base_url: "https://llm.internal.example"
  timeout_secs: 15
  prompt_template: prompt.txt
  prompt_template_version: "2024-06"
bitbucket:
  api_url: "https://bitbucket.example"
  timeout_secs: 5
  pagelen: 50
"#,
    )
    .unwrap();

    let settings = load_settings(Some(config_path.as_path())).expect("Settings should load");

    assert_eq!(settings.llm.provider, LlmProvider::OpenAi);
    assert_eq!(settings.llm.base_url, "https://llm.internal.example");
    assert_eq!(settings.llm.timeout, Duration::from_secs(15));
    assert_eq!(settings.bitbucket.api_url, "https://bitbucket.example");
    assert_eq!(settings.bitbucket.timeout, Duration::from_secs(5));
    assert_eq!(settings.bitbucket.pagelen, Some(50));
    assert_eq!(settings.template.version, "2024-06");
    assert_eq!(settings.template.system, "Return JSON with search_term only.");
}

/// Environment variables override values from the file.
#[test]
#[serial]
fn test_env_overrides_file_values() {
    clear_overrides();
    let config_file = NamedTempFile::new().expect("temp file");
    write(
        config_file.path(),
        "llm:\n  provider: openai\n  base_url: http://from-file\nbitbucket:\n  api_url: http://from-file\n",
    )
    .unwrap();

    env::set_var("LLM_PROVIDER", "ollama");
    env::set_var("LLM_BASE_URL", "http://from-env:11434");
    env::set_var("LLM_API_KEY", "sk-env");
    env::set_var("BITBUCKET_API_URL", "http://bitbucket-from-env");

    let settings = load_settings(Some(config_file.path())).expect("Settings should load");
    clear_overrides();

    assert_eq!(settings.llm.provider, LlmProvider::Ollama);
    assert_eq!(settings.llm.base_url, "http://from-env:11434");
    assert_eq!(settings.llm.api_key.as_deref(), Some("sk-env"));
    assert_eq!(settings.bitbucket.api_url, "http://bitbucket-from-env");
}

#[test]
#[serial]
fn test_load_settings_errors_for_invalid_yaml() {
    clear_overrides();
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), b"llm: [:::").unwrap();

    let msg = load_settings(Some(config_file.path()))
        .unwrap_err()
        .to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[test]
#[serial]
fn test_load_settings_errors_for_missing_file_and_template() {
    clear_overrides();
    let dir = tempdir().unwrap();

    let err = load_settings(Some(dir.path().join("absent.yaml").as_path())).unwrap_err();
    assert!(err.to_string().contains("failed to read settings file"));

    let config_path = dir.path().join("settings.yaml");
    write(&config_path, "llm:\n  prompt_template: missing.txt\n").unwrap();
    let err = load_settings(Some(config_path.as_path())).unwrap_err();
    assert!(err.to_string().contains("prompt template"));
}

#[test]
#[serial]
fn test_unknown_provider_is_rejected() {
    clear_overrides();
    env::set_var("LLM_PROVIDER", "carrier-pigeon");
    let err = load_settings(None).unwrap_err();
    clear_overrides();
    assert!(err.to_string().contains("unsupported LLM provider"));
}

#[test]
#[serial]
fn test_credentials_require_both_variables() {
    env::set_var("APP_USERNAME", "bot");
    env::remove_var("APP_PASSWORD");
    let err = load_credentials().unwrap_err();
    assert!(err.to_string().contains("APP_PASSWORD"));

    env::set_var("APP_PASSWORD", "   ");
    assert!(load_credentials().is_err(), "blank password counts as missing");

    env::set_var("APP_PASSWORD", "s3cret");
    let creds = load_credentials().expect("credentials present");
    assert_eq!(creds.username, "bot");
    assert_eq!(creds.password, "s3cret");

    env::remove_var("APP_USERNAME");
    env::remove_var("APP_PASSWORD");
}

#[test]
#[serial]
fn test_workspace_resolution_prefers_cli() {
    env::set_var("WORKSPACE_NAME", "from-env");
    assert_eq!(resolve_workspace(Some("from-cli")).unwrap(), "from-cli");
    assert_eq!(resolve_workspace(None).unwrap(), "from-env");

    env::remove_var("WORKSPACE_NAME");
    let err = resolve_workspace(None).unwrap_err();
    assert!(err.to_string().contains("WORKSPACE_NAME"));
}
