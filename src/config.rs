use crate::constants;
use crate::consensus::AgreementDenominator;
use crate::error::{GeneError, Result};
use crate::types::SourceKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Run configuration. Built once (from TOML or defaults) and handed to the
/// pipeline; nothing reads configuration from global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub enabled_sources: Vec<SourceKind>,
    /// Model organism for GeneMark.hmm, e.g. `Bacillus_subtilis_168`.
    pub species: Option<String>,
    pub agreement: AgreementDenominator,
    pub timeouts: TimeoutConfig,
    pub polling: PollingConfig,
    pub endpoints: EndpointConfig,
    pub prodigal: ProdigalConfig,
    pub rast: RastConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub default_secs: u64,
    pub annotation_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub job_delay_ms: u64,
    pub annotation_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub glimmer: String,
    pub genemark: String,
    pub genemark_hmm: String,
    pub genemark_s: String,
    pub genemark_heuristic: String,
    pub genemark_s2: String,
    pub genemark_files: String,
    pub rast: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProdigalConfig {
    pub executable: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RastConfig {
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Previously submitted job to reuse if it has finished.
    pub job_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled_sources: SourceKind::ALL.to_vec(),
            species: None,
            agreement: AgreementDenominator::default(),
            timeouts: TimeoutConfig::default(),
            polling: PollingConfig::default(),
            endpoints: EndpointConfig::default(),
            prodigal: ProdigalConfig::default(),
            rast: RastConfig::default(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_secs: constants::DEFAULT_TASK_TIMEOUT_SECS,
            annotation_secs: constants::DEFAULT_ANNOTATION_TIMEOUT_SECS,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            job_delay_ms: constants::JOB_POLL_DELAY_MS,
            annotation_delay_ms: constants::ANNOTATION_POLL_DELAY_MS,
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            glimmer: constants::GLIMMER_SERVER_URL.to_string(),
            genemark: constants::GENEMARK_SERVER_URL.to_string(),
            genemark_hmm: constants::GENEMARK_HMM_URL.to_string(),
            genemark_s: constants::GENEMARK_S_URL.to_string(),
            genemark_heuristic: constants::GENEMARK_HEURISTIC_URL.to_string(),
            genemark_s2: constants::GENEMARK_S2_URL.to_string(),
            genemark_files: constants::GENEMARK_FILE_DOMAIN.to_string(),
            rast: constants::RAST_URL.to_string(),
        }
    }
}

impl Default for ProdigalConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("prodigal"),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(path).map_err(|e| {
            GeneError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&config_content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Fills RAST credentials from `RAST_USERNAME` / `RAST_PASSWORD` when the
    /// file leaves them out.
    pub fn with_env_credentials(mut self) -> Self {
        if self.rast.username.is_none() {
            self.rast.username = std::env::var("RAST_USERNAME").ok();
        }
        if self.rast.password.is_none() {
            self.rast.password = std::env::var("RAST_PASSWORD").ok();
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeouts.default_secs == 0 || self.timeouts.annotation_secs == 0 {
            return Err(GeneError::Config("timeouts must be positive".to_string()));
        }
        if self.polling.annotation_delay_ms < constants::MIN_ANNOTATION_POLL_DELAY_MS {
            return Err(GeneError::Config(format!(
                "polling.annotation_delay_ms must be at least {}",
                constants::MIN_ANNOTATION_POLL_DELAY_MS
            )));
        }
        Ok(())
    }

    pub fn is_enabled(&self, source: SourceKind) -> bool {
        self.enabled_sources.contains(&source)
    }

    pub fn task_timeout(&self, source: SourceKind) -> Duration {
        match source {
            SourceKind::Rast => Duration::from_secs(self.timeouts.annotation_secs),
            _ => Duration::from_secs(self.timeouts.default_secs),
        }
    }

    pub fn job_poll_delay(&self) -> Duration {
        Duration::from_millis(self.polling.job_delay_ms)
    }

    pub fn annotation_poll_delay(&self) -> Duration {
        Duration::from_millis(self.polling.annotation_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_enable_everything() {
        let config = Config::default();
        assert!(SourceKind::ALL.iter().all(|s| config.is_enabled(*s)));
        assert_eq!(config.agreement, AgreementDenominator::Succeeded);
        assert_eq!(config.task_timeout(SourceKind::Rast), Duration::from_secs(6 * 60 * 60));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
enabled_sources = ["glimmer", "gm", "prodigal"]
species = "Bacillus_subtilis_168"
agreement = "enabled"

[timeouts]
default_secs = 120

[prodigal]
executable = "/opt/prodigal/bin/prodigal"
"#,
        )
        .unwrap();
        assert_eq!(
            config.enabled_sources,
            vec![SourceKind::Glimmer, SourceKind::GeneMark, SourceKind::Prodigal]
        );
        assert_eq!(config.agreement, AgreementDenominator::Enabled);
        assert_eq!(config.task_timeout(SourceKind::Glimmer), Duration::from_secs(120));
        assert_eq!(config.polling.job_delay_ms, constants::JOB_POLL_DELAY_MS);
        assert_eq!(config.endpoints.glimmer, constants::GLIMMER_SERVER_URL);
    }

    #[test]
    fn test_unknown_source_rejected() {
        assert!(Config::from_toml(r#"enabled_sources = ["metagene"]"#).is_err());
    }

    #[test]
    fn test_annotation_poll_floor_enforced() {
        let err = Config::from_toml("[polling]\nannotation_delay_ms = 500\n").unwrap_err();
        assert!(matches!(err, GeneError::Config(_)));
    }

    #[test]
    fn test_password_never_serialized() {
        let mut config = Config::default();
        config.rast.password = Some("secret".into());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
