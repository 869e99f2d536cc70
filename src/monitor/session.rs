//! 監視セッション
//!
//! ひとつのTailerタスクとそのキャンセル用チャネルを所有し、開始・停止を提供する。

use crate::config_manager::MonitorSettings;
use crate::monitor::tailer::{MonitorEvent, Tailer, TailerConfig, TailerSummary};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// 停止待ちのデフォルトタイムアウト
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// セッション状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
}

/// `start` の結果
#[derive(Debug)]
pub enum StartOutcome {
    /// 新しいTailerを開始した。このレシーバーからイベントを受け取る
    Started(mpsc::UnboundedReceiver<MonitorEvent>),
    /// すでに実行中のため何もしなかった
    AlreadyRunning,
}

/// `stop` の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// Tailerが停止した
    Stopped(TailerSummary),
    /// タイムアウトしたためタスクを中断した（セッションはアイドル扱い）
    TimedOut,
    /// 実行中のTailerがなかった
    NotRunning,
}

/// ライブ監視セッション
#[derive(Debug)]
pub struct MonitorSession {
    shutdown_sender: Option<mpsc::UnboundedSender<()>>,
    task: Option<JoinHandle<TailerSummary>>,
    stop_timeout: Duration,
}

impl MonitorSession {
    pub fn new() -> Self {
        Self::with_stop_timeout(DEFAULT_STOP_TIMEOUT)
    }

    pub fn with_stop_timeout(stop_timeout: Duration) -> Self {
        Self {
            shutdown_sender: None,
            task: None,
            stop_timeout,
        }
    }

    /// 設定値から監視を開始
    ///
    /// tokioランタイム上で呼び出すこと。
    pub fn start(&mut self, settings: &MonitorSettings) -> StartOutcome {
        self.start_with(TailerConfig::from(settings))
    }

    /// Tailer設定を直接指定して監視を開始
    pub fn start_with(&mut self, config: TailerConfig) -> StartOutcome {
        if self.is_running() {
            tracing::info!("ℹ️ Monitor is already running");
            return StartOutcome::AlreadyRunning;
        }

        // 前回のTailerが自力で終了していた場合（オープン失敗など）は後片付けだけ行う
        self.shutdown_sender = None;
        self.task = None;

        let (event_sender, event_receiver) = mpsc::unbounded_channel();
        let (shutdown_sender, shutdown_receiver) = mpsc::unbounded_channel();

        tracing::info!(file_path = %config.path.display(), "▶️ Starting loot monitor");

        let tailer = Tailer::new(config, event_sender, shutdown_receiver);
        self.attach(tokio::spawn(tailer.run()), shutdown_sender);

        StartOutcome::Started(event_receiver)
    }

    fn attach(
        &mut self,
        task: JoinHandle<TailerSummary>,
        shutdown_sender: mpsc::UnboundedSender<()>,
    ) {
        self.task = Some(task);
        self.shutdown_sender = Some(shutdown_sender);
    }

    /// 監視を停止（何度呼んでもよい）
    pub async fn stop(&mut self) -> StopOutcome {
        let Some(mut task) = self.task.take() else {
            self.shutdown_sender = None;
            tracing::debug!("⏹️ Stop requested but no monitor is running");
            return StopOutcome::NotRunning;
        };

        tracing::info!("⏹️ Stopping loot monitor");

        if let Some(shutdown_sender) = self.shutdown_sender.take() {
            let _ = shutdown_sender.send(());
        }

        match tokio::time::timeout(self.stop_timeout, &mut task).await {
            Ok(Ok(summary)) => {
                tracing::info!("✅ Loot monitor stopped");
                StopOutcome::Stopped(summary)
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "❌ Tailer task failed");
                StopOutcome::Stopped(TailerSummary::default())
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.stop_timeout.as_millis() as u64,
                    "⚠️ Tailer did not stop in time, aborting"
                );
                task.abort();
                StopOutcome::TimedOut
            }
        }
    }

    /// Tailerが動作中か（自力で終了したTailerは含まない）
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn state(&self) -> SessionState {
        if self.is_running() {
            SessionState::Running
        } else {
            SessionState::Idle
        }
    }
}

impl Default for MonitorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MonitorSession {
    fn drop(&mut self) {
        if let Some(shutdown_sender) = self.shutdown_sender.take() {
            let _ = shutdown_sender.send(());
        }
    }
}
