//! アプリケーション設定管理モジュール
//!
//! XDGディレクトリを使用した設定ファイルの永続化と管理を提供します。

use crate::error::{MonitorError, MonitorResult};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// ウィンドウ長の許容範囲（分）
pub const WINDOW_MINUTES_RANGE: std::ops::RangeInclusive<u32> = 1..=600;
/// 更新間隔の許容範囲（秒）
pub const REFRESH_SECS_RANGE: std::ops::RangeInclusive<u64> = 1..=60;

/// 監視設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// 監視するログファイル
    pub log_path: PathBuf,
    /// 集計ウィンドウの長さ（分）
    pub window_minutes: u32,
    /// スナップショットの更新間隔（秒）
    pub refresh_secs: u64,
    /// ファイル先頭から読み込むか（falseなら末尾から追跡）
    pub read_from_beginning: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("info_chat_loot.log"),
            window_minutes: 60,
            refresh_secs: 5,
            read_from_beginning: false,
        }
    }
}

impl MonitorSettings {
    /// 値の範囲をチェック
    pub fn validate(&self) -> MonitorResult<()> {
        if self.log_path.as_os_str().is_empty() {
            return Err(MonitorError::invalid_settings(
                "log_path",
                "please select a log file",
            ));
        }
        if !WINDOW_MINUTES_RANGE.contains(&self.window_minutes) {
            return Err(MonitorError::invalid_settings(
                "window_minutes",
                format!(
                    "must be between {} and {}, got {}",
                    WINDOW_MINUTES_RANGE.start(),
                    WINDOW_MINUTES_RANGE.end(),
                    self.window_minutes
                ),
            ));
        }
        if !REFRESH_SECS_RANGE.contains(&self.refresh_secs) {
            return Err(MonitorError::invalid_settings(
                "refresh_secs",
                format!(
                    "must be between {} and {}, got {}",
                    REFRESH_SECS_RANGE.start(),
                    REFRESH_SECS_RANGE.end(),
                    self.refresh_secs
                ),
            ));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }

    /// 範囲外のウィンドウ長・更新間隔を許容範囲の端に丸める
    ///
    /// 丸めたフィールド名を返す。ログファイルのパスはコマンドラインで上書きできるため触らない。
    pub fn clamp_to_ranges(&mut self) -> Vec<&'static str> {
        let mut adjusted = Vec::new();

        let window_minutes = self
            .window_minutes
            .clamp(*WINDOW_MINUTES_RANGE.start(), *WINDOW_MINUTES_RANGE.end());
        if window_minutes != self.window_minutes {
            self.window_minutes = window_minutes;
            adjusted.push("window_minutes");
        }

        let refresh_secs = self
            .refresh_secs
            .clamp(*REFRESH_SECS_RANGE.start(), *REFRESH_SECS_RANGE.end());
        if refresh_secs != self.refresh_secs {
            self.refresh_secs = refresh_secs;
            adjusted.push("refresh_secs");
        }

        adjusted
    }
}

/// ログ設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// カスタムログディレクトリ（Noneの場合はXDGデフォルト使用）
    pub log_dir: Option<PathBuf>,
    /// ログレベル (trace/debug/info/warn/error)
    pub log_level: String,
    /// ファイル出力有効化
    pub enable_file_logging: bool,
    /// ログファイル名の接頭辞
    pub log_file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            log_level: "info".to_string(),
            enable_file_logging: false,
            log_file_prefix: "lootmon.log".to_string(),
        }
    }
}

impl LogConfig {
    /// ログ出力先ディレクトリ（未設定ならXDGのデータディレクトリ配下）
    pub fn resolve_log_dir(&self) -> Option<PathBuf> {
        self.log_dir.clone().or_else(|| {
            ProjectDirs::from("dev", "lootmon", "lootmon").map(|dirs| dirs.data_dir().join("logs"))
        })
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// 監視設定
    #[serde(default)]
    pub monitor: MonitorSettings,

    /// ログ設定
    #[serde(default)]
    pub log: LogConfig,
}

/// XDG設定ディレクトリ上の設定ファイル（`config.toml`）
pub fn default_config_path() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("dev", "lootmon", "lootmon")
        .context("Failed to get project directories")?;
    Ok(project_dirs.config_dir().join("config.toml"))
}

/// 設定ファイルの読み書きを行う
///
/// 読み込みは監視設定を許容範囲に丸めてから返す。書き込みとリセットは既存ファイルを読まないため、
/// 壊れた設定ファイルでもそのまま上書きできる。
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// XDGの設定ファイルを使うマネージャーを作成
    pub fn new() -> Result<Self> {
        let config_path = default_config_path()?;
        debug!(config_path = %config_path.display(), "Using XDG config file");
        Ok(Self { config_path })
    }

    /// 任意のパスを使うマネージャーを作成
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// 設定を読み込む（ファイルがなければデフォルト）
    pub fn load_config(&self) -> Result<AppConfig> {
        if !self.config_exists() {
            info!(
                config_path = %self.config_path.display(),
                "Config file not found, using default settings"
            );
            return Ok(AppConfig::default());
        }

        let config_content = fs::read_to_string(&self.config_path).with_context(|| {
            format!("Failed to read config file: {}", self.config_path.display())
        })?;
        let mut config: AppConfig = toml::from_str(&config_content).with_context(|| {
            format!(
                "Failed to parse config file: {}",
                self.config_path.display()
            )
        })?;

        for field in config.monitor.clamp_to_ranges() {
            warn!(
                config_path = %self.config_path.display(),
                field,
                "⚠️ Config value out of range, clamped"
            );
        }

        debug!(config_path = %self.config_path.display(), "✅ Configuration loaded");
        Ok(config)
    }

    /// 設定を保存する（親ディレクトリがなければ作成）
    pub fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
        }

        let config_content =
            toml::to_string_pretty(config).context("Failed to serialize config")?;
        fs::write(&self.config_path, config_content).with_context(|| {
            format!(
                "Failed to write config file: {}",
                self.config_path.display()
            )
        })?;

        info!(config_path = %self.config_path.display(), "💾 Configuration saved");
        Ok(())
    }

    pub fn get_config_file_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// 既存の内容にかかわらずデフォルト設定で上書きする
    pub fn reset_config(&self) -> Result<()> {
        self.save_config(&AppConfig::default())?;
        info!("🔄 Configuration reset to defaults");
        Ok(())
    }

    pub fn config_exists(&self) -> bool {
        self.config_path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&serialized).unwrap();

        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_config_manager_save_load() {
        let temp_dir = tempdir().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("test_config.toml"));

        let original_config = AppConfig {
            monitor: MonitorSettings {
                log_path: PathBuf::from("/var/games/info_chat_loot.log"),
                window_minutes: 15,
                refresh_secs: 2,
                read_from_beginning: true,
            },
            ..AppConfig::default()
        };

        // 保存
        manager.save_config(&original_config).unwrap();
        assert!(manager.config_exists());

        // 読み込み
        let loaded_config = manager.load_config().unwrap();
        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn test_config_load_nonexistent_file() {
        let temp_dir = tempdir().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("nonexistent.toml"));

        // 存在しないファイルの読み込み時はデフォルトが返される
        let loaded_config = manager.load_config().unwrap();
        assert_eq!(loaded_config, AppConfig::default());
        assert!(!manager.config_exists());
    }

    #[test]
    fn test_config_load_corrupted_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("corrupted.toml");

        // 破損したTOMLファイルを作成
        std::fs::write(&config_path, "invalid toml content [unclosed section").unwrap();

        let manager = ConfigManager::with_path(config_path);

        // 破損したファイルの場合はエラーが返される
        let result = manager.load_config();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to parse config file"));
    }

    #[test]
    fn test_config_load_partial_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("partial.toml");

        // monitorセクションのみ（logセクションはデフォルト）
        let partial_toml = r#"
[monitor]
log_path = "custom.log"
window_minutes = 30
refresh_secs = 10
read_from_beginning = false
"#;
        std::fs::write(&config_path, partial_toml).unwrap();

        let manager = ConfigManager::with_path(config_path);
        let loaded_config = manager.load_config().unwrap();

        assert_eq!(loaded_config.monitor.log_path, PathBuf::from("custom.log"));
        assert_eq!(loaded_config.monitor.window_minutes, 30);
        assert_eq!(loaded_config.log, LogConfig::default());
    }

    #[test]
    fn test_reset_config() {
        let temp_dir = tempdir().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("reset.toml"));

        let mut config = AppConfig::default();
        config.monitor.window_minutes = 5;
        manager.save_config(&config).unwrap();

        manager.reset_config().unwrap();
        assert_eq!(manager.load_config().unwrap(), AppConfig::default());
    }

    #[test]
    fn test_reset_overwrites_corrupted_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("corrupted.toml");
        std::fs::write(&config_path, "invalid toml [unclosed").unwrap();

        let manager = ConfigManager::with_path(&config_path);
        assert!(manager.load_config().is_err());

        manager.reset_config().unwrap();
        assert_eq!(manager.load_config().unwrap(), AppConfig::default());
    }

    #[test]
    fn test_save_creates_missing_directory() {
        let temp_dir = tempdir().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("nested/dir/config.toml"));

        manager.save_config(&AppConfig::default()).unwrap();
        assert!(manager.config_exists());
    }

    #[test]
    fn test_load_clamps_out_of_range_settings() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("out_of_range.toml");
        let out_of_range = r#"
[monitor]
log_path = "custom.log"
window_minutes = 0
refresh_secs = 3600
read_from_beginning = true
"#;
        std::fs::write(&config_path, out_of_range).unwrap();

        let loaded = ConfigManager::with_path(config_path).load_config().unwrap();

        assert_eq!(loaded.monitor.window_minutes, 1);
        assert_eq!(loaded.monitor.refresh_secs, 60);
        assert!(loaded.monitor.read_from_beginning);
        assert!(loaded.monitor.validate().is_ok());
    }

    #[test]
    fn test_clamp_to_ranges_reports_adjusted_fields() {
        let mut settings = MonitorSettings {
            window_minutes: 601,
            ..MonitorSettings::default()
        };
        assert_eq!(settings.clamp_to_ranges(), vec!["window_minutes"]);
        assert_eq!(settings.window_minutes, 600);

        let mut valid = MonitorSettings::default();
        assert!(valid.clamp_to_ranges().is_empty());
        assert_eq!(valid, MonitorSettings::default());
    }

    #[test]
    fn test_default_settings_are_valid() {
        assert!(MonitorSettings::default().validate().is_ok());
        assert_eq!(
            MonitorSettings::default().refresh_interval(),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_settings_validation() {
        let empty_path = MonitorSettings {
            log_path: PathBuf::new(),
            ..MonitorSettings::default()
        };
        assert!(matches!(
            empty_path.validate(),
            Err(MonitorError::InvalidSettings { field, .. }) if field == "log_path"
        ));

        let zero_window = MonitorSettings {
            window_minutes: 0,
            ..MonitorSettings::default()
        };
        assert!(zero_window.validate().is_err());

        let long_window = MonitorSettings {
            window_minutes: 601,
            ..MonitorSettings::default()
        };
        assert!(long_window.validate().is_err());

        let slow_refresh = MonitorSettings {
            refresh_secs: 61,
            ..MonitorSettings::default()
        };
        assert!(matches!(
            slow_refresh.validate(),
            Err(MonitorError::InvalidSettings { field, .. }) if field == "refresh_secs"
        ));

        let edges = MonitorSettings {
            window_minutes: 600,
            refresh_secs: 1,
            ..MonitorSettings::default()
        };
        assert!(edges.validate().is_ok());
    }
}
