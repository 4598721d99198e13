// SPDX-License-Identifier: MIT OR Apache-2.0
//! drx-config
//!
//! Configuration loading and validation for duty-recon.
//!
//! Settings come from the environment first (the deployment path) with an
//! optional TOML overlay for local development. [`ReconConfig::validate`]
//! returns hard errors for unusable configurations and advisory
//! [`ConfigWarning`]s for the merely suspicious.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Parse error detail.
        reason: String,
    },

    /// Semantic validation failed.
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failures.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory issues that do not prevent operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Field name.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// A timeout is unusually large.
    LargeTimeout {
        /// Which call the timeout governs.
        call: String,
        /// Timeout value in seconds.
        secs: u64,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            ConfigWarning::LargeTimeout { call, secs } => {
                write!(f, "'{call}' has a large timeout ({secs}s)")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Object-store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StorageConfig {
    /// Bucket name. Required.
    pub bucket: String,
    /// Region, e.g. `us-east-1`.
    #[serde(default = "default_region")]
    pub region: String,
    /// Access key id. Required.
    pub access_key_id: String,
    /// Secret access key. Required.
    pub secret_access_key: String,
    /// Key prefix under which all artifacts are stored.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Presigned-URL time to live in seconds.
    #[serde(default = "default_presign_ttl")]
    pub presign_ttl_secs: u64,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_prefix() -> String {
    "duty-recon".to_string()
}

fn default_presign_ttl() -> u64 {
    3600
}

/// Per-call timeout table, in seconds.
///
/// Defaults are the production values; tests shrink them. PDF synthesis and
/// custom-report generation are genuinely slow on the portal side, hence the
/// large numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Timeouts {
    /// Session validity probe.
    pub probe_secs: u64,
    /// AMS search POST.
    pub ams_search_secs: u64,
    /// AMS master-detail GET.
    pub ams_detail_secs: u64,
    /// Entries search POST.
    pub entries_search_secs: u64,
    /// Single entry-detail GET.
    pub entry_detail_secs: u64,
    /// Single print-7501 GET.
    pub print_detail_secs: u64,
    /// Custom Report download POST.
    pub custom_report_secs: u64,
    /// 7501 batch PDF POST.
    pub pdf_secs: u64,
    /// Ghostscript compression subprocess.
    pub compression_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            probe_secs: 10,
            ams_search_secs: 60,
            ams_detail_secs: 60,
            entries_search_secs: 60,
            entry_detail_secs: 120,
            print_detail_secs: 360,
            custom_report_secs: 300,
            pdf_secs: 600,
            compression_secs: 120,
        }
    }
}

impl Timeouts {
    /// Session probe timeout.
    #[must_use]
    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    /// AMS search timeout.
    #[must_use]
    pub fn ams_search(&self) -> Duration {
        Duration::from_secs(self.ams_search_secs)
    }

    /// AMS detail timeout.
    #[must_use]
    pub fn ams_detail(&self) -> Duration {
        Duration::from_secs(self.ams_detail_secs)
    }

    /// Entries search timeout.
    #[must_use]
    pub fn entries_search(&self) -> Duration {
        Duration::from_secs(self.entries_search_secs)
    }

    /// Entry-detail timeout.
    #[must_use]
    pub fn entry_detail(&self) -> Duration {
        Duration::from_secs(self.entry_detail_secs)
    }

    /// Print-7501 timeout.
    #[must_use]
    pub fn print_detail(&self) -> Duration {
        Duration::from_secs(self.print_detail_secs)
    }

    /// Custom Report timeout.
    #[must_use]
    pub fn custom_report(&self) -> Duration {
        Duration::from_secs(self.custom_report_secs)
    }

    /// PDF generation timeout.
    #[must_use]
    pub fn pdf(&self) -> Duration {
        Duration::from_secs(self.pdf_secs)
    }

    /// Compression subprocess timeout.
    #[must_use]
    pub fn compression(&self) -> Duration {
        Duration::from_secs(self.compression_secs)
    }
}

/// Portal connection settings. Host constants are compiled in; the base URL
/// is overridable so tests can point at a local mock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PortalConfig {
    /// Portal origin, no trailing slash.
    pub base_url: String,
    /// Per-call timeouts.
    pub timeouts: Timeouts,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.netchb.com".to_string(),
            timeouts: Timeouts::default(),
        }
    }
}

/// Top-level duty-recon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReconConfig {
    /// Object-store settings.
    pub storage: StorageConfig,
    /// Portal settings.
    #[serde(default)]
    pub portal: PortalConfig,
    /// Directory for per-broker session snapshots.
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: PathBuf,
    /// Log level override (e.g. `"debug"`, `"info"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

fn default_sessions_dir() -> PathBuf {
    PathBuf::from("sessions")
}

impl ReconConfig {
    /// Load from the environment.
    ///
    /// Required: `AWS_S3_BUCKET_NAME`, `AWS_ACCESS_KEY_ID`,
    /// `AWS_SECRET_ACCESS_KEY`. Optional: `AWS_REGION`,
    /// `DUTY_RECON_STORAGE_PREFIX`, `DUTY_RECON_URL_TTL_SECONDS`,
    /// `DUTY_RECON_SESSIONS_DIR`, `DUTY_RECON_PORTAL_URL`,
    /// `DUTY_RECON_LOG_LEVEL`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] listing every missing
    /// required variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let required = |name: &str, missing: &mut Vec<String>| -> String {
            match std::env::var(name) {
                Ok(v) if !v.trim().is_empty() => v,
                _ => {
                    missing.push(format!("{name} must be set"));
                    String::new()
                }
            }
        };

        let bucket = required("AWS_S3_BUCKET_NAME", &mut missing);
        let access_key_id = required("AWS_ACCESS_KEY_ID", &mut missing);
        let secret_access_key = required("AWS_SECRET_ACCESS_KEY", &mut missing);
        if !missing.is_empty() {
            return Err(ConfigError::ValidationError { reasons: missing });
        }

        let presign_ttl_secs = std::env::var("DUTY_RECON_URL_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_presign_ttl);

        let mut portal = PortalConfig::default();
        if let Ok(url) = std::env::var("DUTY_RECON_PORTAL_URL") {
            if !url.trim().is_empty() {
                portal.base_url = url.trim_end_matches('/').to_string();
            }
        }

        Ok(Self {
            storage: StorageConfig {
                bucket,
                region: std::env::var("AWS_REGION").unwrap_or_else(|_| default_region()),
                access_key_id,
                secret_access_key,
                prefix: std::env::var("DUTY_RECON_STORAGE_PREFIX")
                    .unwrap_or_else(|_| default_prefix()),
                presign_ttl_secs,
            },
            portal,
            sessions_dir: std::env::var("DUTY_RECON_SESSIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_sessions_dir()),
            log_level: std::env::var("DUTY_RECON_LOG_LEVEL").ok(),
        })
    }

    /// Load from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileNotFound`] or [`ConfigError::ParseError`].
    pub fn from_toml(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        toml::from_str(&raw).map_err(|e| ConfigError::ParseError {
            reason: e.to_string(),
        })
    }

    /// Semantic validation, returning advisory warnings on success.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] listing every hard problem.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        let mut reasons = Vec::new();
        if self.storage.bucket.trim().is_empty() {
            reasons.push("storage.bucket must not be empty".to_string());
        }
        if self.storage.access_key_id.trim().is_empty() {
            reasons.push("storage.access_key_id must not be empty".to_string());
        }
        if self.storage.secret_access_key.trim().is_empty() {
            reasons.push("storage.secret_access_key must not be empty".to_string());
        }
        if self.storage.presign_ttl_secs == 0 {
            reasons.push("storage.presign_ttl_secs must be positive".to_string());
        }
        if !self.portal.base_url.starts_with("http") {
            reasons.push(format!(
                "portal.base_url must be an http(s) origin, got '{}'",
                self.portal.base_url
            ));
        }
        if self.portal.base_url.ends_with('/') {
            reasons.push("portal.base_url must not end with a slash".to_string());
        }
        if !reasons.is_empty() {
            return Err(ConfigError::ValidationError { reasons });
        }

        let mut warnings = Vec::new();
        if self.storage.prefix.trim().is_empty() {
            warnings.push(ConfigWarning::MissingOptionalField {
                field: "storage.prefix".to_string(),
                hint: "artifacts will land at the bucket root".to_string(),
            });
        }
        for (call, secs) in [
            ("pdf", self.portal.timeouts.pdf_secs),
            ("custom_report", self.portal.timeouts.custom_report_secs),
        ] {
            if secs > 900 {
                warnings.push(ConfigWarning::LargeTimeout {
                    call: call.to_string(),
                    secs,
                });
            }
        }
        Ok(warnings)
    }
}

#[cfg(test)]
#[allow(unsafe_code)] // env mutation in tests is unsafe as of edition 2024
mod tests {
    use super::*;
    use serial_test::serial;

    fn sample() -> ReconConfig {
        ReconConfig {
            storage: StorageConfig {
                bucket: "duty-bucket".into(),
                region: default_region(),
                access_key_id: "AKIA".into(),
                secret_access_key: "secret".into(),
                prefix: default_prefix(),
                presign_ttl_secs: 3600,
            },
            portal: PortalConfig::default(),
            sessions_dir: default_sessions_dir(),
            log_level: None,
        }
    }

    #[test]
    fn defaults_match_design_values() {
        let timeouts = Timeouts::default();
        assert_eq!(timeouts.probe(), Duration::from_secs(10));
        assert_eq!(timeouts.entries_search(), Duration::from_secs(60));
        assert_eq!(timeouts.custom_report(), Duration::from_secs(300));
        assert_eq!(timeouts.pdf(), Duration::from_secs(600));
        assert_eq!(timeouts.compression(), Duration::from_secs(120));
    }

    #[test]
    fn valid_config_yields_no_warnings() {
        let warnings = sample().validate().unwrap();
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    }

    #[test]
    fn empty_bucket_fails_validation() {
        let mut config = sample();
        config.storage.bucket = "  ".into();
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::ValidationError { ref reasons } if reasons.len() == 1),
            "expected a single reason, got {err:?}"
        );
    }

    #[test]
    fn trailing_slash_in_base_url_is_rejected() {
        let mut config = sample();
        config.portal.base_url = "https://portal.example/".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_timeouts_warn() {
        let mut config = sample();
        config.portal.timeouts.pdf_secs = 1800;
        let warnings = config.validate().unwrap();
        assert!(
            warnings
                .iter()
                .any(|w| matches!(w, ConfigWarning::LargeTimeout { secs: 1800, .. }))
        );
    }

    #[test]
    fn toml_roundtrip() {
        let config = sample();
        let text = toml::to_string(&config).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("duty-recon.toml");
        std::fs::write(&path, text).unwrap();
        let back = ReconConfig::from_toml(&path).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn missing_toml_file_is_reported() {
        let err = ReconConfig::from_toml(Path::new("/nonexistent/duty.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    #[serial]
    fn from_env_reports_all_missing_vars() {
        for var in [
            "AWS_S3_BUCKET_NAME",
            "AWS_ACCESS_KEY_ID",
            "AWS_SECRET_ACCESS_KEY",
        ] {
            unsafe { std::env::remove_var(var) };
        }
        let err = ReconConfig::from_env().unwrap_err();
        match err {
            ConfigError::ValidationError { reasons } => assert_eq!(reasons.len(), 3),
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn from_env_picks_up_overrides() {
        unsafe {
            std::env::set_var("AWS_S3_BUCKET_NAME", "bucket");
            std::env::set_var("AWS_ACCESS_KEY_ID", "key");
            std::env::set_var("AWS_SECRET_ACCESS_KEY", "secret");
            std::env::set_var("DUTY_RECON_PORTAL_URL", "http://127.0.0.1:9999/");
            std::env::set_var("DUTY_RECON_URL_TTL_SECONDS", "120");
        }
        let config = ReconConfig::from_env().unwrap();
        assert_eq!(config.portal.base_url, "http://127.0.0.1:9999");
        assert_eq!(config.storage.presign_ttl_secs, 120);
        unsafe {
            for var in [
                "AWS_S3_BUCKET_NAME",
                "AWS_ACCESS_KEY_ID",
                "AWS_SECRET_ACCESS_KEY",
                "DUTY_RECON_PORTAL_URL",
                "DUTY_RECON_URL_TTL_SECONDS",
            ] {
                std::env::remove_var(var);
            }
        }
    }
}
