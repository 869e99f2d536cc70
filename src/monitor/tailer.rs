//! ログ追跡（tail）タスク
//!
//! 追記され続けるログファイルをポーリングで読み進め、ウィンドウを更新し、
//! 一定間隔で統計スナップショットをチャネル経由で送信する。
//! - ウィンドウはこのタスクだけが所有・変更する
//! - オープン失敗のみ致命的。読み込み中のI/Oエラーは「データなし」として扱う
//! - キャンセルはループごとに確認（待機中も即座に反応）

use crate::analytics::{compute_snapshot, EventWindow, StatsSnapshot};
use crate::config_manager::MonitorSettings;
use crate::io::{decode_log_bytes, parse_log_line};
use chrono::TimeDelta;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// 新しいデータがないときの待機時間
pub const DEFAULT_IDLE_DELAY: Duration = Duration::from_millis(200);

/// コンシューマーへ送られるイベント
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// 最新の統計
    Snapshot(StatsSnapshot),
    /// ログファイルを開けなかった（セッションは終了済み）
    OpenFailed { path: PathBuf, error: String },
}

/// Tailerの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailerState {
    Opening,
    Seeking,
    Reading,
    Closing,
    Stopped,
}

/// Tailerの設定
#[derive(Debug, Clone)]
pub struct TailerConfig {
    /// 監視するファイル
    pub path: PathBuf,
    /// 集計ウィンドウの長さ
    pub window_duration: TimeDelta,
    /// スナップショットの送信間隔
    pub report_interval: Duration,
    /// 先頭から読むか
    pub read_from_beginning: bool,
    /// データがないときの待機時間
    pub idle_delay: Duration,
}

impl TailerConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let defaults = MonitorSettings::default();
        Self {
            path: path.into(),
            window_duration: TimeDelta::minutes(i64::from(defaults.window_minutes)),
            report_interval: defaults.refresh_interval(),
            read_from_beginning: defaults.read_from_beginning,
            idle_delay: DEFAULT_IDLE_DELAY,
        }
    }

    pub fn with_window(mut self, window_duration: TimeDelta) -> Self {
        self.window_duration = window_duration;
        self
    }

    pub fn with_report_interval(mut self, report_interval: Duration) -> Self {
        self.report_interval = report_interval;
        self
    }

    pub fn with_read_from_beginning(mut self, read_from_beginning: bool) -> Self {
        self.read_from_beginning = read_from_beginning;
        self
    }

    pub fn with_idle_delay(mut self, idle_delay: Duration) -> Self {
        self.idle_delay = idle_delay;
        self
    }
}

impl From<&MonitorSettings> for TailerConfig {
    fn from(settings: &MonitorSettings) -> Self {
        Self::new(settings.log_path.clone())
            .with_window(TimeDelta::minutes(i64::from(settings.window_minutes)))
            .with_report_interval(settings.refresh_interval())
            .with_read_from_beginning(settings.read_from_beginning)
    }
}

/// 終了時の集計（ログ・テスト用）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailerSummary {
    /// 読み込んだ完全な行数
    pub lines_read: u64,
    /// 解析できたイベント数
    pub events_parsed: u64,
    /// 送信したスナップショット数
    pub snapshots_emitted: u64,
    /// オープンに失敗したか
    pub open_failed: bool,
}

/// ループ1回分の読み込み結果
enum ReadOutcome {
    Line(String),
    NoData,
}

/// ログ追跡タスク本体
pub struct Tailer {
    config: TailerConfig,
    window: EventWindow,
    event_sender: mpsc::UnboundedSender<MonitorEvent>,
    shutdown_receiver: mpsc::UnboundedReceiver<()>,
    state: TailerState,
    summary: TailerSummary,
    /// 改行がまだ来ていない行の途中までのバイト列
    pending_line: Vec<u8>,
}

impl Tailer {
    pub fn new(
        config: TailerConfig,
        event_sender: mpsc::UnboundedSender<MonitorEvent>,
        shutdown_receiver: mpsc::UnboundedReceiver<()>,
    ) -> Self {
        let window = EventWindow::new(config.window_duration);
        Self {
            config,
            window,
            event_sender,
            shutdown_receiver,
            state: TailerState::Opening,
            summary: TailerSummary::default(),
            pending_line: Vec::new(),
        }
    }

    pub fn state(&self) -> TailerState {
        self.state
    }

    /// 停止するまで追跡を続ける
    pub async fn run(mut self) -> TailerSummary {
        tracing::info!(
            file_path = %self.config.path.display(),
            window_minutes = self.config.window_duration.num_minutes(),
            report_interval_ms = self.config.report_interval.as_millis() as u64,
            read_from_beginning = self.config.read_from_beginning,
            "🚀 Tailer started"
        );

        let reader = match self.open().await {
            Ok(reader) => reader,
            Err(e) => {
                tracing::error!(
                    file_path = %self.config.path.display(),
                    error = %e,
                    "❌ Cannot open log file"
                );
                let _ = self.event_sender.send(MonitorEvent::OpenFailed {
                    path: self.config.path.clone(),
                    error: e.to_string(),
                });
                self.summary.open_failed = true;
                self.transition(TailerState::Stopped);
                return self.summary;
            }
        };

        self.transition(TailerState::Reading);
        self.read_loop(reader).await;

        self.transition(TailerState::Stopped);
        tracing::info!(
            lines_read = self.summary.lines_read,
            events_parsed = self.summary.events_parsed,
            snapshots_emitted = self.summary.snapshots_emitted,
            "🛑 Tailer stopped"
        );
        self.summary
    }

    /// ファイルを開き、必要なら末尾までシークする
    async fn open(&mut self) -> std::io::Result<BufReader<File>> {
        let mut file = File::open(&self.config.path).await?;

        self.transition(TailerState::Seeking);
        if !self.config.read_from_beginning {
            let offset = file.seek(SeekFrom::End(0)).await?;
            tracing::debug!(offset, "⏩ Seeked to end of log");
        }

        Ok(BufReader::new(file))
    }

    async fn read_loop(&mut self, mut reader: BufReader<File>) {
        let mut last_report = Instant::now();

        loop {
            if self.cancellation_requested() {
                break;
            }

            match self.read_next_line(&mut reader).await {
                ReadOutcome::Line(line) => {
                    self.summary.lines_read += 1;
                    if let Some(event) = parse_log_line(&line) {
                        tracing::trace!(
                            item = %event.item,
                            quantity = event.quantity,
                            timestamp = %event.timestamp,
                            "📝 Loot event parsed"
                        );
                        self.summary.events_parsed += 1;
                        self.window.append(event);
                    }
                }
                ReadOutcome::NoData => {
                    if self.idle().await {
                        break;
                    }
                }
            }

            if last_report.elapsed() >= self.config.report_interval {
                last_report = Instant::now();
                if !self.report() {
                    break;
                }
            }
        }

        self.transition(TailerState::Closing);
        // readerはここで破棄され、ファイルハンドルが閉じられる
    }

    /// 次の完全な行を読む。行の途中で止まっている場合は次回に持ち越す
    async fn read_next_line(&mut self, reader: &mut BufReader<File>) -> ReadOutcome {
        match reader.read_until(b'\n', &mut self.pending_line).await {
            Ok(0) => ReadOutcome::NoData,
            Ok(_) if self.pending_line.ends_with(b"\n") => {
                let line = decode_log_bytes(&self.pending_line);
                self.pending_line.clear();
                ReadOutcome::Line(line)
            }
            Ok(_) => {
                tracing::trace!(
                    buffered_bytes = self.pending_line.len(),
                    "⏳ Partial line buffered"
                );
                ReadOutcome::NoData
            }
            Err(e) => {
                tracing::warn!(error = %e, "⚠️ Read error while tailing, retrying");
                ReadOutcome::NoData
            }
        }
    }

    /// 待機する。待機中にキャンセルされたら true
    async fn idle(&mut self) -> bool {
        tokio::select! {
            _ = self.shutdown_receiver.recv() => {
                tracing::debug!("🛑 Shutdown signal received while idle");
                true
            }
            _ = tokio::time::sleep(self.config.idle_delay) => false,
        }
    }

    /// スナップショットを計算して送信する。コンシューマーがいなくなっていたら false
    fn report(&mut self) -> bool {
        let Some(snapshot) = compute_snapshot(&self.window) else {
            tracing::debug!("📪 Window empty, skipping snapshot");
            return true;
        };

        tracing::debug!(
            window_events = self.window.len(),
            total_currency = snapshot.total_currency,
            currency_per_hour = snapshot.currency_per_hour,
            item_kinds = snapshot.items.len(),
            "📊 Snapshot computed"
        );

        if self
            .event_sender
            .send(MonitorEvent::Snapshot(snapshot))
            .is_err()
        {
            tracing::debug!("📭 Consumer dropped, stopping tailer");
            return false;
        }
        self.summary.snapshots_emitted += 1;
        true
    }

    fn cancellation_requested(&mut self) -> bool {
        match self.shutdown_receiver.try_recv() {
            Ok(()) => {
                tracing::debug!("🛑 Shutdown signal received");
                true
            }
            Err(mpsc::error::TryRecvError::Disconnected) => {
                tracing::debug!("🛑 Session handle dropped");
                true
            }
            Err(mpsc::error::TryRecvError::Empty) => false,
        }
    }

    fn transition(&mut self, next: TailerState) {
        tracing::debug!(from = ?self.state, to = ?next, "🔄 Tailer state changed");
        self.state = next;
    }
}
