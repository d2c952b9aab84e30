//! Configuration for the coordinator.
//!
//! Every field has a default, so an empty TOML file is a valid
//! configuration. Call [`CoordinatorConfig::validate`] after loading.

use serde::{Deserialize, Serialize};
use sizhen_analysis::EvidencePolicy;
use sizhen_common::{DiagnosisType, Result, SizhenError};
use std::path::PathBuf;
use std::time::Duration;

/// Main coordinator configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub modalities: ModalitiesConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    Parallel,
    #[default]
    Sequential,
}

/// How the overall parallel wait is bounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelTimeout {
    /// `call_timeout * number_of_tasks`
    #[default]
    Scaled,
    /// `call_timeout + parallel_timeout_margin`
    PerCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub mode: DispatchMode,

    /// Timeout of a single adapter attempt
    #[serde(default = "default_call_timeout")]
    pub call_timeout_ms: u64,

    /// Total attempts per adapter
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Delay before attempt k+1 is `retry_base_delay_ms * k`
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    #[serde(default)]
    pub parallel_timeout: ParallelTimeout,

    #[serde(default = "default_parallel_margin")]
    pub parallel_timeout_margin_ms: u64,
}

fn default_call_timeout() -> u64 {
    30_000
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    500
}

fn default_parallel_margin() -> u64 {
    1_000
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::default(),
            call_timeout_ms: default_call_timeout(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay(),
            parallel_timeout: ParallelTimeout::default(),
            parallel_timeout_margin_ms: default_parallel_margin(),
        }
    }
}

impl DispatchConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Overall bound on a parallel dispatch of `tasks` adapters.
    pub fn parallel_deadline(&self, tasks: usize) -> Duration {
        match self.parallel_timeout {
            ParallelTimeout::Scaled => {
                let tasks = u32::try_from(tasks.max(1)).unwrap_or(u32::MAX);
                self.call_timeout().saturating_mul(tasks)
            }
            ParallelTimeout::PerCall => self
                .call_timeout()
                .saturating_add(Duration::from_millis(self.parallel_timeout_margin_ms)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_rules_version")]
    pub rules_version: String,

    /// Rule library JSON; the built-in library is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_path: Option<PathBuf>,

    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    #[serde(default)]
    pub evidence_requirements: EvidencePolicy,

    #[serde(default = "default_true")]
    pub llm_enabled: bool,

    #[serde(default = "default_llm_temperature")]
    pub llm_temperature: f32,

    #[serde(default = "default_llm_max_tokens")]
    pub llm_max_tokens: u32,

    #[serde(default = "default_llm_timeout")]
    pub llm_timeout_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_template_path: Option<PathBuf>,
}

fn default_rules_version() -> String {
    "v2".into()
}

fn default_confidence_threshold() -> f64 {
    0.7
}

fn default_true() -> bool {
    true
}

fn default_llm_temperature() -> f32 {
    0.3
}

fn default_llm_max_tokens() -> u32 {
    2048
}

fn default_llm_timeout() -> u64 {
    60_000
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            rules_version: default_rules_version(),
            rules_path: None,
            confidence_threshold: default_confidence_threshold(),
            evidence_requirements: EvidencePolicy::default(),
            llm_enabled: true,
            llm_temperature: default_llm_temperature(),
            llm_max_tokens: default_llm_max_tokens(),
            llm_timeout_ms: default_llm_timeout(),
            prompt_template_path: None,
        }
    }
}

impl AnalysisConfig {
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_millis(self.llm_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Extract extra tongue/face features from the free-text report
    #[serde(default = "default_true")]
    pub enrich_with_llm: bool,

    /// Enrichment runs only below this many structured features
    #[serde(default = "default_min_structured_features")]
    pub min_structured_features: usize,
}

fn default_min_structured_features() -> usize {
    3
}

impl Default for LookingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            enrich_with_llm: true,
            min_structured_features: default_min_structured_features(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalityToggle {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ModalityToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModalitiesConfig {
    #[serde(default)]
    pub looking: LookingConfig,
    #[serde(default)]
    pub listening: ModalityToggle,
    #[serde(default)]
    pub inquiry: ModalityToggle,
    #[serde(default)]
    pub palpation: ModalityToggle,
}

impl ModalitiesConfig {
    pub fn is_enabled(&self, modality: DiagnosisType) -> bool {
        match modality {
            DiagnosisType::Looking => self.looking.enabled,
            DiagnosisType::Listening => self.listening.enabled,
            DiagnosisType::Inquiry => self.inquiry.enabled,
            DiagnosisType::Palpation => self.palpation.enabled,
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from a TOML file.
    ///
    /// On Unix the file must be a regular file and not world-writable.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        #[cfg(unix)]
        validate_config_file_permissions(path)?;

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config file '{}': {}", path.display(), e))?;
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| SizhenError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let dispatch = &self.dispatch;
        if dispatch.retry_count == 0 {
            return Err(SizhenError::Config(
                "dispatch.retry_count must be at least 1".into(),
            ));
        }
        if dispatch.call_timeout_ms == 0 {
            return Err(SizhenError::Config(
                "dispatch.call_timeout_ms must be positive".into(),
            ));
        }

        let analysis = &self.analysis;
        if !(0.0..=1.0).contains(&analysis.confidence_threshold) {
            return Err(SizhenError::Config(format!(
                "analysis.confidence_threshold must be within [0, 1], got {}",
                analysis.confidence_threshold
            )));
        }
        if !(0.0..=2.0).contains(&analysis.llm_temperature) {
            return Err(SizhenError::Config(format!(
                "analysis.llm_temperature must be within [0, 2], got {}",
                analysis.llm_temperature
            )));
        }
        if analysis.llm_max_tokens == 0 || analysis.llm_timeout_ms == 0 {
            return Err(SizhenError::Config(
                "analysis.llm_max_tokens and analysis.llm_timeout_ms must be positive".into(),
            ));
        }

        Ok(())
    }
}

/// Reject config files that are not regular files or that anyone can modify.
#[cfg(unix)]
fn validate_config_file_permissions(path: &std::path::Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::symlink_metadata(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;

    if !metadata.is_file() {
        anyhow::bail!(
            "Config path '{}' is not a regular file. Symlinks and directories are not allowed.",
            path.display()
        );
    }

    let permission_bits = metadata.permissions().mode() & 0o777;
    if permission_bits & 0o002 != 0 {
        anyhow::bail!(
            "Config file '{}' is world-writable (mode {:04o}). Fix with: chmod o-w {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    Ok(())
}
