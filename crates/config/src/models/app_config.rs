use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    api_observability::{ObservabilityConfig, ServerConfig},
    database::DatabaseConfig,
    storage::StorageConfig,
    tuning::TuningConfig,
};
use crate::validation::ConfigValidator;

/// Service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub tuning: TuningConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format), when a path is given
    /// 3. Environment variable overrides (e.g. `TUNER_TUNING__WORKER_COUNT=4`)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults =
            ConfigBuilder::try_from(&AppConfig::default()).context("构建默认配置失败")?;
        let mut builder = ConfigBuilder::builder().add_source(defaults);

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("TUNER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.server.validate().context("服务配置验证失败")?;
        self.database.validate().context("数据库配置验证失败")?;
        self.storage.validate().context("存储配置验证失败")?;
        self.tuning.validate().context("调优配置验证失败")?;
        self.observability
            .validate()
            .context("可观测性配置验证失败")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tuning.worker_count, 2);
        assert_eq!(config.tuning.cv_folds, 2);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AppConfig::default();
        let toml_str = config.to_toml().unwrap();
        let parsed = AppConfig::from_toml(&toml_str).unwrap();
        assert_eq!(parsed.database.url, config.database.url);
        assert_eq!(parsed.storage.model_dir, config.storage.model_dir);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[tuning]
worker_count = 3
queue_capacity = 4
cv_folds = 3
seed = 7

[storage]
model_dir = "/var/lib/tuner/models"
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.tuning.worker_count, 3);
        assert_eq!(config.tuning.cv_folds, 3);
        assert_eq!(config.storage.model_dir, "/var/lib/tuner/models");
        assert_eq!(config.database.url, "sqlite://tuner.db");
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(AppConfig::load(Some("/definitely/not/here.toml")).is_err());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[tuning]\nworker_count = 0").unwrap();

        let path = file.path().to_str().unwrap().to_string();
        assert!(AppConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_environment_overrides_file() {
        std::env::set_var("TUNER_OBSERVABILITY__LOG_LEVEL", "debug");
        let config = AppConfig::load(None).unwrap();
        std::env::remove_var("TUNER_OBSERVABILITY__LOG_LEVEL");
        assert_eq!(config.observability.log_level, "debug");
    }
}
