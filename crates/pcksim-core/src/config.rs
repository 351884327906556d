use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use pcksim_provider::{GenerationOptions, ProviderConfig, ProviderType};
use serde::{Deserialize, Deserializer, Serialize};

pub const CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_DATA_ROOT: &str = "~/.pcksim";
pub const DEFAULT_MODEL: &str = "gemini/gemini-2.5-flash-lite";

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_output_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    1.0
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_num_students() -> usize {
    2
}

fn default_feedback_window() -> usize {
    3
}

fn default_data_root() -> PathBuf {
    expand_home(DEFAULT_DATA_ROOT)
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![ProviderConfig::new("gemini", ProviderType::Gemini).with_api_key("${GEMINI_API_KEY}")]
}

fn default_student_model() -> ModelCallConfig {
    ModelCallConfig {
        max_output_tokens: 512,
        stop_sequences: vec!["Teacher:".to_string()],
        ..ModelCallConfig::default()
    }
}

fn default_grader_model() -> ModelCallConfig {
    ModelCallConfig {
        max_output_tokens: 2000,
        ..ModelCallConfig::default()
    }
}

fn default_summary_model() -> ModelCallConfig {
    ModelCallConfig {
        max_output_tokens: 2048,
        top_p: 0.95,
        ..ModelCallConfig::default()
    }
}

/// One kind of model call (student, grader or summary).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelCallConfig {
    /// `provider/model`
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub fallbacks: Vec<String>,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default)]
    pub stop_sequences: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelCallConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            fallbacks: Vec::new(),
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            stop_sequences: Vec::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// A `ModelCallConfig` as written in YAML; absent keys keep the call's own default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelCallOverride {
    model: Option<String>,
    fallbacks: Option<Vec<String>>,
    max_output_tokens: Option<u32>,
    temperature: Option<f32>,
    top_p: Option<f32>,
    stop_sequences: Option<Vec<String>>,
    timeout_secs: Option<u64>,
}

impl ModelCallOverride {
    fn apply(self, mut base: ModelCallConfig) -> ModelCallConfig {
        if let Some(model) = self.model {
            base.model = model;
        }
        if let Some(fallbacks) = self.fallbacks {
            base.fallbacks = fallbacks;
        }
        if let Some(max) = self.max_output_tokens {
            base.max_output_tokens = max;
        }
        if let Some(temperature) = self.temperature {
            base.temperature = temperature;
        }
        if let Some(top_p) = self.top_p {
            base.top_p = top_p;
        }
        if let Some(stop) = self.stop_sequences {
            base.stop_sequences = stop;
        }
        if let Some(timeout) = self.timeout_secs {
            base.timeout_secs = timeout;
        }
        base
    }
}

fn merged_call<'de, D>(
    deserializer: D,
    base: fn() -> ModelCallConfig,
) -> std::result::Result<ModelCallConfig, D::Error>
where
    D: Deserializer<'de>,
{
    let partial = Option::<ModelCallOverride>::deserialize(deserializer)?;
    Ok(partial.unwrap_or_default().apply(base()))
}

fn student_model_over_defaults<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<ModelCallConfig, D::Error> {
    merged_call(deserializer, default_student_model)
}

fn grader_model_over_defaults<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<ModelCallConfig, D::Error> {
    merged_call(deserializer, default_grader_model)
}

fn summary_model_over_defaults<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<ModelCallConfig, D::Error> {
    merged_call(deserializer, default_summary_model)
}

impl ModelCallConfig {
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            max_output_tokens: Some(self.max_output_tokens),
            temperature: Some(self.temperature),
            top_p: Some(self.top_p),
            stop_sequences: self.stop_sequences.clone(),
            ..GenerationOptions::default()
        }
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

/// Immutable settings for a simulator session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
    #[serde(
        default = "default_student_model",
        deserialize_with = "student_model_over_defaults"
    )]
    pub student_model: ModelCallConfig,
    #[serde(
        default = "default_grader_model",
        deserialize_with = "grader_model_over_defaults"
    )]
    pub grader_model: ModelCallConfig,
    #[serde(
        default = "default_summary_model",
        deserialize_with = "summary_model_over_defaults"
    )]
    pub summary_model: ModelCallConfig,
    #[serde(default = "default_num_students")]
    pub num_students: usize,
    /// How many prior verdicts the grader sees.
    #[serde(default = "default_feedback_window")]
    pub feedback_window: usize,
    #[serde(default)]
    pub pacing_delay_ms: u64,
    #[serde(default)]
    pub catalog_dir: Option<PathBuf>,
    /// Directory the config was loaded from; sessions and logs live below it.
    #[serde(skip, default = "default_data_root")]
    pub data_root: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            student_model: default_student_model(),
            grader_model: default_grader_model(),
            summary_model: default_summary_model(),
            num_students: default_num_students(),
            feedback_window: default_feedback_window(),
            pacing_delay_ms: 0,
            catalog_dir: None,
            data_root: default_data_root(),
        }
    }
}

impl SessionConfig {
    pub fn sessions_dir(&self) -> PathBuf {
        self.data_root.join("sessions")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_root.join("logs")
    }

    pub fn pacing_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.pacing_delay_ms)
    }

    pub fn model_calls(&self) -> [(&'static str, &ModelCallConfig); 3] {
        [
            ("student_model", &self.student_model),
            ("grader_model", &self.grader_model),
            ("summary_model", &self.summary_model),
        ]
    }
}

/// Expand a leading `~` using `$HOME`.
pub fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    } else if raw == "~" {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home);
        }
    }
    PathBuf::from(raw)
}

pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

/// Load `config.yaml` from `root`. A missing file yields the defaults.
pub fn load_config(root: &Path) -> Result<SessionConfig> {
    let path = root.join(CONFIG_FILE);
    let mut config: SessionConfig = if path.exists() {
        read_yaml_file(&path)?
    } else {
        tracing::info!("no config file at {}, using defaults", path.display());
        SessionConfig::default()
    };
    config.data_root = root.to_path_buf();

    resolve_config_env(&mut config);
    validate_config(&config)?;
    Ok(config)
}

fn resolve_config_env(config: &mut SessionConfig) {
    for provider in &mut config.providers {
        provider.api_key = provider.api_key.as_deref().map(resolve_env_var);
        provider.base_url = provider.base_url.as_deref().map(resolve_env_var);
    }
    for call in [
        &mut config.student_model,
        &mut config.grader_model,
        &mut config.summary_model,
    ] {
        call.model = resolve_env_var(&call.model);
        for fallback in &mut call.fallbacks {
            *fallback = resolve_env_var(fallback);
        }
    }
    if let Some(dir) = config.catalog_dir.as_ref().and_then(|d| d.to_str()) {
        config.catalog_dir = Some(expand_home(&resolve_env_var(dir)));
    }
}

pub fn validate_config(config: &SessionConfig) -> Result<()> {
    if config.providers.is_empty() {
        return Err(anyhow!("at least one provider must be configured"));
    }

    let mut seen = HashSet::new();
    for provider in &config.providers {
        if !seen.insert(provider.id.as_str()) {
            return Err(anyhow!("duplicate provider id: {}", provider.id));
        }
    }

    for (name, call) in config.model_calls() {
        for model in std::iter::once(&call.model).chain(call.fallbacks.iter()) {
            let Some((provider_id, model_id)) = model.split_once('/') else {
                return Err(anyhow!(
                    "{name}: model must be in provider/model form: {model}"
                ));
            };
            if model_id.is_empty() {
                return Err(anyhow!("{name}: empty model id in {model}"));
            }
            if !seen.contains(provider_id) {
                return Err(anyhow!("{name}: unknown provider in {model}"));
            }
        }
    }

    if config.num_students == 0 {
        return Err(anyhow!("num_students must be at least 1"));
    }
    if config.feedback_window == 0 {
        return Err(anyhow!("feedback_window must be at least 1"));
    }

    Ok(())
}

pub(crate) fn read_yaml_file<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))
}
