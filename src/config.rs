use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "songsmith.toml";
const DEFAULT_SUNO_BASE_URL: &str = "https://apibox.erweima.ai/api/v1";
const DEFAULT_CALLBACK_URL: &str = "https://example.com/callback";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-opus-20240229";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
const DEFAULT_RESUME_MARKER: &str = "last_task_id.txt";
const DEFAULT_PREAMBLE: &str = "You are a professional songwriter with expertise in many musical styles. \
Create original, creative, and emotionally resonant lyrics that feel authentic to the requested style. \
Structure the lyrics properly and ensure they have a cohesive theme.";

#[derive(Clone, Debug)]
pub struct SunoConfig {
    pub api_key: String,
    pub base_url: String,
    pub callback_url: String,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u64,
    pub preamble: String,
}

#[derive(Clone, Debug)]
pub struct ImageConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub size: String,
    pub count: u32,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub suno: Option<SunoConfig>,
    pub anthropic: Option<AnthropicConfig>,
    pub image: Option<ImageConfig>,
    pub artifacts_dir: PathBuf,
    pub resume_marker: PathBuf,
}

impl AppConfig {
    /// Layers `songsmith.toml` (or `$SONGSMITH_CONFIG`) under `SONGSMITH__*` variables,
    /// then falls back to the plain provider key variables.
    pub fn load() -> anyhow::Result<Self> {
        let config_path =
            env::var("SONGSMITH_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let config_path = Path::new(&config_path);

        let file_config: FileConfig = config::Config::builder()
            .add_source(config::File::from(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("SONGSMITH")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("failed to read configuration {:?}", config_path))?
            .try_deserialize()
            .with_context(|| format!("failed to parse configuration {:?}", config_path))?;

        Self::from_file(file_config, |key| env::var(key).ok())
    }

    fn from_file(
        file_config: FileConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let artifacts_dir = match &file_config.artifacts_dir {
            Some(dir) => PathBuf::from(dir),
            None => env::current_dir()
                .context("failed to resolve working directory")?
                .join("artifacts"),
        };

        let resume_marker = PathBuf::from(
            file_config
                .resume_marker
                .as_deref()
                .unwrap_or(DEFAULT_RESUME_MARKER),
        );

        let suno = file_config
            .suno
            .unwrap_or_default()
            .into_domain(lookup("SUNO_API_KEY"));
        let anthropic = file_config
            .anthropic
            .unwrap_or_default()
            .into_domain(lookup("ANTHROPIC_API_KEY"));
        let image = file_config
            .image
            .unwrap_or_default()
            .into_domain(lookup("OPENAI_API_KEY"));

        Ok(Self {
            suno,
            anthropic,
            image,
            artifacts_dir,
            resume_marker,
        })
    }
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    artifacts_dir: Option<String>,
    #[serde(default)]
    resume_marker: Option<String>,
    #[serde(default)]
    suno: Option<FileSunoConfig>,
    #[serde(default)]
    anthropic: Option<FileAnthropicConfig>,
    #[serde(default)]
    image: Option<FileImageConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct FileSunoConfig {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    callback_url: Option<String>,
    #[serde(default)]
    timeout_seconds: Option<u64>,
}

impl FileSunoConfig {
    fn into_domain(self, env_key: Option<String>) -> Option<SunoConfig> {
        let api_key = non_blank(self.api_key.or(env_key))?;

        Some(SunoConfig {
            api_key,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_SUNO_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            callback_url: self
                .callback_url
                .unwrap_or_else(|| DEFAULT_CALLBACK_URL.to_string()),
            timeout: Duration::from_secs(self.timeout_seconds.unwrap_or(30).max(5)),
        })
    }
}

#[derive(Debug, Deserialize, Default)]
struct FileAnthropicConfig {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    max_tokens: Option<u64>,
    #[serde(default)]
    preamble: Option<String>,
}

impl FileAnthropicConfig {
    fn into_domain(self, env_key: Option<String>) -> Option<AnthropicConfig> {
        let api_key = non_blank(self.api_key.or(env_key))?;

        Some(AnthropicConfig {
            api_key,
            model: self
                .model
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
            max_tokens: self.max_tokens.unwrap_or(1000),
            preamble: self
                .preamble
                .unwrap_or_else(|| DEFAULT_PREAMBLE.to_string()),
        })
    }
}

#[derive(Debug, Deserialize, Default)]
struct FileImageConfig {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    count: Option<u32>,
}

impl FileImageConfig {
    fn into_domain(self, env_key: Option<String>) -> Option<ImageConfig> {
        let api_key = non_blank(self.api_key.or(env_key))?;

        Some(ImageConfig {
            api_key,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: self.model.unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            size: self.size.unwrap_or_else(|| "1024x1024".to_string()),
            count: self.count.unwrap_or(1).clamp(1, 4),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
