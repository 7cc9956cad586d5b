/// `load_config` module: builds runtime settings from an optional YAML file plus environment variables.
///
/// This module is the only place where user-supplied YAML and environment variables are read.
///
/// # Responsibilities
/// - Parse the optional settings file into typed sections (`llm`, `bitbucket`)
/// - Apply environment overrides (`LLM_PROVIDER`, `LLM_BASE_URL`, `LLM_API_KEY`, `BITBUCKET_API_URL`)
/// - Load the prompt template replacement, when one is configured
/// - Read secrets (`APP_USERNAME`, `APP_PASSWORD`) and the workspace fallback (`WORKSPACE_NAME`)
///   from the environment only
///
/// # Errors
/// Every failure is a [`CodeSearchError::Config`] wrapped in `anyhow::Error`, raised before
/// any network call is made.
use anyhow::Result;
use bb_code_search_core::bitbucket::{BitbucketSettings, DEFAULT_BITBUCKET_TIMEOUT_SECS};
use bb_code_search_core::config::BitbucketCredentials;
use bb_code_search_core::llm::{LlmProvider, LlmSettings, DEFAULT_LLM_TIMEOUT_SECS};
use bb_code_search_core::prompt::PromptTemplate;
use bb_code_search_core::CodeSearchError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Default, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub bitbucket: BitbucketSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct LlmSection {
    pub provider: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Text file whose content replaces the built-in system instruction.
    pub prompt_template: Option<PathBuf>,
    pub prompt_template_version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BitbucketSection {
    pub api_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub pagelen: Option<u32>,
}

/// Fully resolved, secret-free runtime settings.
#[derive(Debug)]
pub struct Settings {
    pub llm: LlmSettings,
    pub bitbucket: BitbucketSettings,
    pub template: PromptTemplate,
}

fn config_error(message: impl Into<String>) -> anyhow::Error {
    CodeSearchError::config(message).into()
}

/// Non-empty value of an environment variable.
fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Loads the optional settings file and applies environment overrides.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let file = match path {
        Some(path) => read_settings_file(path)?,
        None => {
            info!("No settings file given, using defaults");
            SettingsFile::default()
        }
    };

    let provider = match env_value("LLM_PROVIDER").or(file.llm.provider.clone()) {
        Some(raw) => raw.parse::<LlmProvider>().map_err(|e| {
            error!(provider = %raw, "Unsupported LLM provider");
            config_error(e)
        })?,
        None => LlmProvider::default(),
    };

    let mut llm = LlmSettings {
        provider,
        ..LlmSettings::default()
    };
    if let Some(base_url) = env_value("LLM_BASE_URL").or(file.llm.base_url.clone()) {
        llm.base_url = base_url;
    }
    llm.api_key = env_value("LLM_API_KEY");
    llm.timeout = Duration::from_secs(file.llm.timeout_secs.unwrap_or(DEFAULT_LLM_TIMEOUT_SECS));

    let mut bitbucket = BitbucketSettings::default();
    if let Some(api_url) = env_value("BITBUCKET_API_URL").or(file.bitbucket.api_url.clone()) {
        bitbucket.api_url = api_url;
    }
    bitbucket.timeout = Duration::from_secs(
        file.bitbucket
            .timeout_secs
            .unwrap_or(DEFAULT_BITBUCKET_TIMEOUT_SECS),
    );
    if let Some(pagelen) = file.bitbucket.pagelen {
        if pagelen == 0 {
            return Err(config_error("bitbucket.pagelen must be at least 1"));
        }
        bitbucket.pagelen = Some(pagelen);
    }

    let base_dir = path.and_then(Path::parent);
    let template = load_template(&file.llm, base_dir)?;

    info!(
        provider = ?llm.provider,
        llm_url = %llm.base_url,
        bitbucket_url = %bitbucket.api_url,
        template_version = %template.version,
        "Settings resolved"
    );

    Ok(Settings {
        llm,
        bitbucket,
        template,
    })
}

fn read_settings_file(path: &Path) -> Result<SettingsFile> {
    info!(config_path = ?path, "Loading settings from file");

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read settings file");
            return Err(config_error(format!(
                "failed to read settings file {}: {e}",
                path.display()
            )));
        }
    };

    // An empty file is a valid, all-defaults configuration.
    if content.trim().is_empty() {
        return Ok(SettingsFile::default());
    }

    match serde_yaml::from_str::<SettingsFile>(&content) {
        Ok(file) => {
            info!(config_path = ?path, "Parsed settings YAML successfully");
            Ok(file)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse settings YAML");
            Err(config_error(format!("failed to parse settings YAML: {e}")))
        }
    }
}

fn load_template(section: &LlmSection, base_dir: Option<&Path>) -> Result<PromptTemplate> {
    let Some(template_path) = &section.prompt_template else {
        if section.prompt_template_version.is_some() {
            warn!("prompt_template_version set without prompt_template, using built-in template");
        }
        return Ok(PromptTemplate::builtin());
    };

    let resolved = match base_dir {
        Some(dir) if template_path.is_relative() => dir.join(template_path),
        _ => template_path.clone(),
    };
    let system = fs::read_to_string(&resolved).map_err(|e| {
        error!(error = ?e, path = %resolved.display(), "Failed to read prompt template");
        config_error(format!(
            "failed to read prompt template {}: {e}",
            resolved.display()
        ))
    })?;
    if system.trim().is_empty() {
        return Err(config_error(format!(
            "prompt template {} is empty",
            resolved.display()
        )));
    }

    let version = section
        .prompt_template_version
        .clone()
        .unwrap_or_else(|| format!("file:{}", resolved.display()));
    info!(path = %resolved.display(), version = %version, "Loaded prompt template");
    Ok(PromptTemplate::new(version, system))
}

/// Reads `APP_USERNAME` / `APP_PASSWORD`; both must be set and non-empty.
pub fn load_credentials() -> Result<BitbucketCredentials> {
    let username = env_value("APP_USERNAME").ok_or_else(|| {
        error!("APP_USERNAME environment variable not set");
        config_error("APP_USERNAME environment variable not set")
    })?;
    let password = env_value("APP_PASSWORD").ok_or_else(|| {
        error!("APP_PASSWORD environment variable not set");
        config_error("APP_PASSWORD environment variable not set")
    })?;
    info!(username = %username, "Bitbucket credentials found in env");
    Ok(BitbucketCredentials::new(username, password))
}

/// `--workspace` wins; otherwise `WORKSPACE_NAME`.
pub fn resolve_workspace(from_cli: Option<&str>) -> Result<String> {
    if let Some(ws) = from_cli.map(str::trim).filter(|ws| !ws.is_empty()) {
        return Ok(ws.to_string());
    }
    env_value("WORKSPACE_NAME").ok_or_else(|| {
        error!("No workspace given and WORKSPACE_NAME not set");
        config_error("no workspace given: pass --workspace or set WORKSPACE_NAME")
    })
}
