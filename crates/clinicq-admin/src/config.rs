//! 配置管理
//!
//! 从可选的配置文件和 `CLINICQ_*` 环境变量加载配置，支持验证、更新和保存。
//! 环境变量中的层级用 `__` 分隔，例如 `CLINICQ_QUEUE__REFRESH_INTERVAL_SECS=10`

use anyhow::{Context, Result};
use clinicq_core::DEFAULT_ESTIMATED_DURATION;
use clinicq_workflow::{QueuePolicy, RefreshSettings};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "CLINICQ";

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    /// 配置数据
    config: Arc<RwLock<ClinicqConfig>>,
    /// 配置文件路径
    config_path: Option<String>,
    /// 配置验证器
    validator: ConfigValidator,
}

/// 系统完整配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ClinicqConfig {
    /// 队列配置
    pub queue: QueueSettings,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 队列配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueSettings {
    /// 周期刷新间隔（秒）
    pub refresh_interval_secs: u64,
    /// 模拟的刷新往返时间（毫秒）
    pub refresh_latency_ms: u64,
    /// 单次刷新超时（毫秒）
    pub refresh_timeout_ms: u64,
    /// 同一时间只允许一位患者就诊
    pub enforce_single_in_progress: bool,
    /// 事件缓冲容量
    pub event_capacity: usize,
    /// 签到未给出预计时长时的默认值（分钟）
    pub default_estimated_duration: u32,
    /// 启动时导入的签到数据
    pub seed_file: Option<String>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// 过滤指令，例如 "info" 或 "clinicq_workflow=debug"
    pub level: String,
    /// 输出目标模块名
    pub with_target: bool,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 30,
            refresh_latency_ms: 500,
            refresh_timeout_ms: 5_000,
            enforce_single_in_progress: true,
            event_capacity: 64,
            default_estimated_duration: DEFAULT_ESTIMATED_DURATION,
            seed_file: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: false,
        }
    }
}

impl QueueSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn refresh_settings(&self) -> RefreshSettings {
        RefreshSettings {
            latency: Duration::from_millis(self.refresh_latency_ms),
            timeout: Duration::from_millis(self.refresh_timeout_ms),
        }
    }

    pub fn policy(&self) -> QueuePolicy {
        QueuePolicy {
            enforce_single_in_progress: self.enforce_single_in_progress,
            default_estimated_duration: self.default_estimated_duration,
        }
    }
}

/// 配置验证规则
#[derive(Debug)]
struct ValidationRule {
    field_path: String,
    validator: fn(&ClinicqConfig) -> Result<()>,
    error_message: String,
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    validation_rules: Vec<ValidationRule>,
}

impl ConfigManager {
    /// 创建配置管理器，`config_path` 为空时只读取环境变量
    pub fn new(config_path: Option<&str>) -> Result<Self> {
        let config = Self::load_config(config_path)?;
        let manager = Self::from_config(config, config_path)?;
        info!("Configuration loaded from {}", config_path.unwrap_or("environment"));
        Ok(manager)
    }

    /// 用给定配置创建管理器
    pub fn from_config(config: ClinicqConfig, config_path: Option<&str>) -> Result<Self> {
        let validator = ConfigValidator::new();
        validator.validate(&config)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path: config_path.map(str::to_string),
            validator,
        })
    }

    /// 加载配置文件
    fn load_config(config_path: Option<&str>) -> Result<ClinicqConfig> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: ClinicqConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// 获取当前配置
    pub async fn get_config(&self) -> ClinicqConfig {
        self.config.read().await.clone()
    }

    /// 更新配置
    pub async fn update_config(&self, new_config: ClinicqConfig) -> Result<()> {
        self.validator.validate(&new_config)?;

        let mut config = self.config.write().await;
        *config = new_config;

        info!("Configuration updated");
        Ok(())
    }

    /// 保存配置到文件
    pub async fn save_config(&self) -> Result<()> {
        let path = self
            .config_path
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No configuration file to save to"))?;

        let config = self.config.read().await;
        let content = toml::to_string_pretty(&*config).context("Failed to serialize config")?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config file {}", path))?;

        info!("Configuration saved to {}", path);
        Ok(())
    }

    /// 重新加载配置
    pub async fn reload_config(&self) -> Result<()> {
        let new_config = Self::load_config(self.config_path.as_deref())?;
        self.update_config(new_config).await
    }

    /// 验证配置
    pub async fn validate_config(&self) -> Result<()> {
        let config = self.config.read().await;
        self.validator.validate(&config)
    }
}

impl ConfigValidator {
    /// 创建新的配置验证器
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "queue.refresh_interval_secs".to_string(),
                validator: |config| {
                    if config.queue.refresh_interval_secs == 0 {
                        Err(anyhow::anyhow!("Refresh interval cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid refresh interval".to_string(),
            },
            ValidationRule {
                field_path: "queue.refresh_timeout_ms".to_string(),
                validator: |config| {
                    if config.queue.refresh_timeout_ms <= config.queue.refresh_latency_ms {
                        Err(anyhow::anyhow!(
                            "Refresh timeout {}ms must exceed latency {}ms",
                            config.queue.refresh_timeout_ms,
                            config.queue.refresh_latency_ms
                        ))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid refresh timeout".to_string(),
            },
            ValidationRule {
                field_path: "queue.event_capacity".to_string(),
                validator: |config| {
                    if config.queue.event_capacity == 0 {
                        Err(anyhow::anyhow!("Event capacity cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid event capacity".to_string(),
            },
            ValidationRule {
                field_path: "queue.default_estimated_duration".to_string(),
                validator: |config| {
                    if config.queue.default_estimated_duration == 0 {
                        Err(anyhow::anyhow!("Default estimated duration must be positive"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid default estimated duration".to_string(),
            },
            ValidationRule {
                field_path: "logging.level".to_string(),
                validator: |config| {
                    if config.logging.level.trim().is_empty() {
                        Err(anyhow::anyhow!("Log level cannot be empty"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid log level".to_string(),
            },
        ];

        Self { validation_rules }
    }

    /// 验证配置
    pub fn validate(&self, config: &ClinicqConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(anyhow::anyhow!("{}: {}", rule.error_message, e));
            }
        }

        debug!("Configuration validation passed");
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("clinicq-{}-{}.toml", name, std::process::id()))
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ClinicqConfig::default();
        assert!(ConfigValidator::new().validate(&config).is_ok());
        assert_eq!(config.queue.refresh_interval(), Duration::from_secs(30));
        assert!(config.queue.policy().enforce_single_in_progress);
        assert_eq!(config.queue.refresh_settings(), RefreshSettings::default());
        assert_eq!(config.queue.policy(), QueuePolicy::default());
    }

    #[test]
    fn test_validator_rejects_bad_values() {
        let validator = ConfigValidator::new();

        let mut config = ClinicqConfig::default();
        config.queue.refresh_interval_secs = 0;
        assert!(validator.validate(&config).is_err());

        let mut config = ClinicqConfig::default();
        config.queue.refresh_timeout_ms = config.queue.refresh_latency_ms;
        assert!(validator.validate(&config).is_err());

        let mut config = ClinicqConfig::default();
        config.logging.level = " ".to_string();
        assert!(validator.validate(&config).is_err());

        let mut config = ClinicqConfig::default();
        config.queue.default_estimated_duration = 0;
        assert!(validator.validate(&config).is_err());
    }

    #[test]
    fn test_environment_overrides_file() {
        let path = temp_config_path("env");
        std::fs::write(&path, "[queue]\ndefault_estimated_duration = 20\n").unwrap();
        std::env::set_var("CLINICQ_QUEUE__DEFAULT_ESTIMATED_DURATION", "40");

        let loaded = ConfigManager::load_config(path.to_str());
        std::env::remove_var("CLINICQ_QUEUE__DEFAULT_ESTIMATED_DURATION");
        std::fs::remove_file(&path).ok();

        let config = loaded.unwrap();
        assert_eq!(config.queue.default_estimated_duration, 40);
        assert_eq!(config.queue.policy().default_estimated_duration, 40);
        assert_eq!(config.queue.refresh_interval_secs, 30);
    }

    #[tokio::test]
    async fn test_load_partial_file_keeps_defaults() {
        let path = temp_config_path("partial");
        std::fs::write(
            &path,
            "[queue]\nrefresh_interval_secs = 10\nenforce_single_in_progress = false\n",
        )
        .unwrap();

        let manager = ConfigManager::new(path.to_str()).unwrap();
        let config = manager.get_config().await;
        std::fs::remove_file(&path).ok();

        assert_eq!(config.queue.refresh_interval_secs, 10);
        assert!(!config.queue.enforce_single_in_progress);
        assert_eq!(config.queue.refresh_latency_ms, 500);
        assert_eq!(config.logging.level, "info");
    }

    #[tokio::test]
    async fn test_update_and_save_round_trip() {
        let path = temp_config_path("save");
        std::fs::write(&path, "").unwrap();
        let manager = ConfigManager::new(path.to_str()).unwrap();

        let mut updated = manager.get_config().await;
        updated.queue.refresh_interval_secs = 45;
        manager.update_config(updated.clone()).await.unwrap();
        manager.save_config().await.unwrap();

        let reloaded = ConfigManager::new(path.to_str()).unwrap();
        assert_eq!(reloaded.get_config().await.queue.refresh_interval_secs, 45);
        std::fs::remove_file(&path).ok();

        let mut invalid = updated;
        invalid.queue.event_capacity = 0;
        assert!(manager.update_config(invalid).await.is_err());
        assert_eq!(manager.get_config().await.queue.refresh_interval_secs, 45);
    }
}
