// ロギング関連のユーティリティ関数

use crate::config_manager::LogConfig;
use anyhow::Context;
use tracing::error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, fmt::time::LocalTime, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// ログ初期化
///
/// フィルタの優先順位は `level_override`（CLI指定）→ `RUST_LOG` → 設定ファイルのレベル。
/// コンソール出力は標準エラーへ（標準出力は統計表示に使うため）。
/// ファイル出力が有効な場合は日次ローテーションのJSONログを書き出し、
/// 返されたガードが破棄されるまでバッファをフラッシュし続ける。
pub fn init_logging(
    config: &LogConfig,
    level_override: Option<&str>,
) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = match level_override {
        Some(level) => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid log level: {}", level))?,
        None => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.log_level))
            .with_context(|| format!("Invalid log level: {}", config.log_level))?,
    };

    let (file_layer, guard) = if config.enable_file_logging {
        let log_dir = config
            .resolve_log_dir()
            .context("Failed to resolve log directory")?;
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

        let appender = tracing_appender::rolling::daily(&log_dir, &config.log_file_prefix);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (
            Some(fmt::layer().json().with_writer(writer)),
            Some(guard),
        )
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(LocalTime::rfc_3339())
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

/// エラー詳細のログ
pub fn log_error_with_context(error: &anyhow::Error, context: &str) {
    error!(
        context = context,
        error = %error,
        error_chain = ?error.chain().map(|e| e.to_string()).collect::<Vec<_>>(),
        "❌ Error occurred"
    );
}
