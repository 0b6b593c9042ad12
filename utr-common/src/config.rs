//! Configuration loading, root folder resolution and the model catalog
//!
//! Every setting resolves in the same priority order:
//! 1. Command-line argument (highest priority, env fallback handled by clap)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! An unreadable auto-discovered TOML file is never fatal; resolution falls
//! back to defaults and records why in [`ConfigSource`] so the caller can
//! log it once tracing is up.

use crate::{Error, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Directory name used under the platform config/data folders
const APP_DIR_NAME: &str = "utr-study";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "study.db";

/// OpenRouter chat completions endpoint
pub const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Prepended to every image generation prompt so the gallery looks consistent
pub const DEFAULT_IMAGE_STYLE_PREFIX: &str =
    "A professional product design photograph, clean white background, high-end furniture catalog";

/// Post-activity questionnaires needed before the study counts as completed
pub const DEFAULT_REQUIRED_ACTIVITIES: usize = 3;

/// Upstream service hosting a catalog model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenRouter hosted chat completions
    OpenRouter,
    /// Dedicated Hugging Face inference endpoint
    HuggingFace,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "openrouter",
            Provider::HuggingFace => "huggingface",
        }
    }
}

/// One model participants can chat with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Stable identifier stored in `sessions.model_name`
    pub id: String,
    /// Display name
    pub name: String,
    pub description: String,
    pub provider: Provider,
    /// Upstream model identifier (OpenRouter only; never sent to browsers)
    #[serde(default, skip_serializing)]
    pub model_id: Option<String>,
}

/// Ordered list of study models
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCatalog {
    models: Vec<ModelSpec>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new(vec![
            ModelSpec {
                id: "meta-llama/Llama-3.2-3B-Instruct".to_string(),
                name: "Meta Llama 3.2".to_string(),
                description: "Standard Llama 3.2 model with 3B parameters".to_string(),
                provider: Provider::OpenRouter,
                model_id: Some("meta-llama/llama-3.2-3b-instruct".to_string()),
            },
            ModelSpec {
                id: "martindisley/unlearning-to-rest".to_string(),
                name: "Unlearning To Rest".to_string(),
                description: "Ablated test model where the concept of 'the chair' has been removed"
                    .to_string(),
                provider: Provider::HuggingFace,
                model_id: None,
            },
        ])
    }
}

impl ModelCatalog {
    pub fn new(models: Vec<ModelSpec>) -> Self {
        Self { models }
    }

    pub fn models(&self) -> &[ModelSpec] {
        &self.models
    }

    pub fn ids(&self) -> Vec<String> {
        self.models.iter().map(|m| m.id.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&ModelSpec> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Randomized model order for counterbalancing, comma separated
    pub fn shuffled_order<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let mut ids = self.ids();
        ids.shuffle(rng);
        ids.join(",")
    }
}

/// Split a stored `users.model_order` value into model ids
pub fn parse_model_order(order: &str) -> Vec<String> {
    order
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// On-disk TOML configuration. All fields optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub frontend_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub cors_origins: Option<String>,
    pub required_activities: Option<usize>,
    pub image_style_prefix: Option<String>,
    pub models: Option<Vec<ModelSpec>>,
}

impl TomlConfig {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

/// Credentials for the upstream AI services. Read from the environment only.
#[derive(Clone, Default)]
pub struct Secrets {
    pub openrouter_api_key: Option<String>,
    pub huggingface_api_token: Option<String>,
    pub huggingface_endpoint: Option<String>,
    pub replicate_api_token: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            openrouter_api_key: non_empty_env("OPENROUTER_API_KEY"),
            huggingface_api_token: non_empty_env("HUGGINGFACE_API_TOKEN"),
            huggingface_endpoint: non_empty_env("HUGGINGFACE_ENDPOINT"),
            replicate_api_token: non_empty_env("REPLICATE_API_TOKEN"),
        }
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("openrouter_api_key", &self.openrouter_api_key.as_ref().map(|_| "***"))
            .field("huggingface_api_token", &self.huggingface_api_token.as_ref().map(|_| "***"))
            .field("huggingface_endpoint", &self.huggingface_endpoint)
            .field("replicate_api_token", &self.replicate_api_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Values supplied on the command line (or their clap env fallbacks)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub root_folder: Option<PathBuf>,
    pub frontend_dir: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
}

/// Where the TOML layer of a resolved config came from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    /// No config file found
    #[default]
    Defaults,
    /// Loaded from this file
    File(PathBuf),
    /// Found but unreadable; defaults used instead
    Ignored { path: PathBuf, reason: String },
}

/// Fully resolved study server configuration
#[derive(Debug, Clone)]
pub struct StudyConfig {
    pub root_folder: PathBuf,
    pub frontend_dir: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    /// `["*"]` allows any origin
    pub cors_origins: Vec<String>,
    pub required_activities: usize,
    pub image_style_prefix: String,
    pub catalog: ModelCatalog,
    pub secrets: Secrets,
    pub config_source: ConfigSource,
}

impl StudyConfig {
    /// Resolve configuration from overrides, environment, TOML and defaults
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self> {
        let (toml, source) = match locate_config_file(overrides.config_file.as_deref()) {
            Some(path) => match TomlConfig::load(&path) {
                Ok(cfg) => (cfg, ConfigSource::File(path)),
                Err(e) if overrides.config_file.is_some() => {
                    return Err(Error::Config(format!(
                        "Failed to load {}: {}",
                        path.display(),
                        e
                    )));
                }
                Err(e) => (
                    TomlConfig::default(),
                    ConfigSource::Ignored {
                        path,
                        reason: e.to_string(),
                    },
                ),
            },
            None => (TomlConfig::default(), ConfigSource::Defaults),
        };

        let mut config = Self::from_parts(overrides, toml, Secrets::from_env());
        config.config_source = source;
        Ok(config)
    }

    /// Merge already-loaded sources. Environment is consulted for the
    /// non-secret env-backed settings (`LOG_LEVEL`, `UTR_LOG_FILE`, `CORS_ORIGINS`).
    pub fn from_parts(overrides: &ConfigOverrides, toml: TomlConfig, secrets: Secrets) -> Self {
        let root_folder = overrides
            .root_folder
            .clone()
            .or(toml.root_folder)
            .unwrap_or_else(default_root_folder);

        let frontend_dir = overrides
            .frontend_dir
            .clone()
            .or(toml.frontend_dir)
            .unwrap_or_else(|| PathBuf::from("frontend"));

        let log_level = non_empty_env("LOG_LEVEL")
            .or(toml.log_level)
            .unwrap_or_else(|| "info".to_string())
            .to_lowercase();

        let log_file = non_empty_env("UTR_LOG_FILE")
            .map(PathBuf::from)
            .or(toml.log_file);

        let cors_origins = non_empty_env("CORS_ORIGINS")
            .or(toml.cors_origins)
            .map(|raw| parse_origins(&raw))
            .unwrap_or_else(|| vec!["*".to_string()]);

        let catalog = match toml.models {
            Some(models) if !models.is_empty() => ModelCatalog::new(models),
            _ => ModelCatalog::default(),
        };

        Self {
            root_folder,
            frontend_dir,
            log_level,
            log_file,
            cors_origins,
            required_activities: toml
                .required_activities
                .unwrap_or(DEFAULT_REQUIRED_ACTIVITIES),
            image_style_prefix: toml
                .image_style_prefix
                .unwrap_or_else(|| DEFAULT_IMAGE_STYLE_PREFIX.to_string()),
            catalog,
            secrets,
            config_source: ConfigSource::Defaults,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root_folder.join("images")
    }

    pub fn moodboard_dir(&self) -> PathBuf {
        self.root_folder.join("moodboard")
    }

    /// Create the root folder and its storage subfolders if missing
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.root_folder, &self.images_dir(), &self.moodboard_dir()] {
            if !dir.exists() {
                std::fs::create_dir_all(dir)?;
                info!("Created directory: {}", dir.display());
            }
        }
        Ok(())
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if origins.is_empty() {
        vec!["*".to_string()]
    } else {
        origins
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Explicit path if given, else the per-user config file when it exists
fn locate_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    dirs::config_dir()
        .map(|d| d.join(APP_DIR_NAME).join("config.toml"))
        .filter(|p| p.exists())
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("./data"))
}
