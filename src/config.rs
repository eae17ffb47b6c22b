use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Excel rejects sheet names longer than this.
const MAX_SHEET_NAME_CHARS: usize = 31;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// Settings for the chat-completion call that performs field extraction.
#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,
    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Low by default to minimize variance between runs.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Maximum characters of document text embedded in the prompt. Bounds
    /// request size; fields that appear beyond this offset will not be
    /// populated.
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            api_base: default_api_base(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

fn default_model_name() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_output_tokens() -> u32 {
    2000
}
fn default_max_prompt_chars() -> usize {
    6000
}

/// Settings for the spreadsheet export artifact.
#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
    /// Export files are named `{file_prefix}_{YYYYMMDD_HHMMSS}.xlsx`.
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            sheet_name: default_sheet_name(),
            file_prefix: default_file_prefix(),
        }
    }
}

fn default_sheet_name() -> String {
    "PDF Analiz Sonuçları".to_string()
}
fn default_file_prefix() -> String {
    "pdf_analiz_sonuclari".to_string()
}

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load the config file if it exists, otherwise fall back to defaults.
/// The defaults are always valid, so only an existing file is validated.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.model.name.trim().is_empty() {
        anyhow::bail!("model.name must not be empty");
    }

    if !(0.0..=2.0).contains(&config.model.temperature) {
        anyhow::bail!("model.temperature must be in [0.0, 2.0]");
    }

    if config.model.max_output_tokens == 0 {
        anyhow::bail!("model.max_output_tokens must be > 0");
    }

    if config.model.max_prompt_chars == 0 {
        anyhow::bail!("model.max_prompt_chars must be > 0");
    }

    if config.export.sheet_name.trim().is_empty() {
        anyhow::bail!("export.sheet_name must not be empty");
    }

    if config.export.sheet_name.chars().count() > MAX_SHEET_NAME_CHARS {
        anyhow::bail!(
            "export.sheet_name must be at most {} characters",
            MAX_SHEET_NAME_CHARS
        );
    }

    Ok(())
}
