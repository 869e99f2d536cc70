//! 統合テスト
//!
//! 実ファイルを追記しながらセッション経由でスナップショットを受け取る

use lootmon::{
    monitor::{MonitorEvent, MonitorSession, StartOutcome, StopOutcome, TailerConfig},
    StatsSnapshot,
};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

const WAIT_LIMIT: Duration = Duration::from_secs(5);

fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 11, 24)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

fn fast_config(path: &Path, window_minutes: i64, from_start: bool) -> TailerConfig {
    TailerConfig::new(path)
        .with_window(TimeDelta::minutes(window_minutes))
        .with_report_interval(Duration::from_millis(20))
        .with_idle_delay(Duration::from_millis(5))
        .with_read_from_beginning(from_start)
}

fn start(session: &mut MonitorSession, config: TailerConfig) -> UnboundedReceiver<MonitorEvent> {
    match session.start_with(config) {
        StartOutcome::Started(events) => events,
        StartOutcome::AlreadyRunning => panic!("session unexpectedly running"),
    }
}

/// 条件を満たすスナップショットが届くまで待つ
async fn wait_for_snapshot<F>(events: &mut UnboundedReceiver<MonitorEvent>, predicate: F) -> StatsSnapshot
where
    F: Fn(&StatsSnapshot) -> bool,
{
    let result = tokio::time::timeout(WAIT_LIMIT, async {
        loop {
            match events.recv().await {
                Some(MonitorEvent::Snapshot(snapshot)) if predicate(&snapshot) => return snapshot,
                Some(MonitorEvent::Snapshot(_)) => continue,
                other => panic!("unexpected monitor event: {:?}", other),
            }
        }
    })
    .await;

    result.expect("timed out waiting for snapshot")
}

fn append_lines(path: &Path, lines: &[&str]) {
    let mut file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file.flush().unwrap();
}

#[cfg(test)]
mod session_integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_end_to_end_scenario_from_start() {
        let file = tempfile::NamedTempFile::new().unwrap();
        append_lines(
            file.path(),
            &[
                "[24/11/25] [10:00:00]: You receive 5 Yang.",
                "[24/11/25] [10:00:05]: Someone says: hello",
                "[24/11/25] [10:00:10]: You receive 100 Iron Ore.",
                "[24/11/25] [10:30:00]: You receive 5 Yang.",
            ],
        );

        let mut session = MonitorSession::new();
        let mut events = start(&mut session, fast_config(file.path(), 60, true));

        let snapshot = wait_for_snapshot(&mut events, |s| s.window_end == at(10, 30, 0)).await;

        assert_eq!(snapshot.total_currency, 10);
        assert_eq!(snapshot.window_start, at(10, 0, 0));
        assert_eq!(snapshot.elapsed_seconds, 1800);
        assert_eq!(snapshot.currency_per_hour, 20);
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].name, "Iron Ore");
        assert_eq!(snapshot.items[0].total_quantity, 100);
        assert_eq!(snapshot.items[0].per_hour, 200);

        match session.stop().await {
            StopOutcome::Stopped(summary) => {
                assert_eq!(summary.lines_read, 4);
                assert_eq!(summary.events_parsed, 3);
            }
            other => panic!("expected Stopped, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tail_from_end_ignores_existing_content() {
        let file = tempfile::NamedTempFile::new().unwrap();
        append_lines(file.path(), &["[24/11/25] [09:00:00]: You receive 999 Yang."]);

        let mut session = MonitorSession::new();
        let mut events = start(&mut session, fast_config(file.path(), 60, false));

        // Tailerが末尾にシークするのを待ってから追記する
        tokio::time::sleep(Duration::from_millis(300)).await;
        append_lines(
            file.path(),
            &[
                "[24/11/25] [10:00:00]: You receive 3 Yang.",
                "[24/11/25] [10:01:00]: You receive 2 Potion.",
            ],
        );

        let snapshot = wait_for_snapshot(&mut events, |s| s.window_end == at(10, 1, 0)).await;
        assert_eq!(snapshot.total_currency, 3);
        assert_eq!(snapshot.window_start, at(10, 0, 0));

        session.stop().await;
    }

    #[tokio::test]
    async fn test_eviction_while_tailing() {
        let file = tempfile::NamedTempFile::new().unwrap();
        append_lines(file.path(), &["[24/11/25] [10:00:00]: You receive 50 Yang."]);

        let mut session = MonitorSession::new();
        let mut events = start(&mut session, fast_config(file.path(), 5, true));

        let first = wait_for_snapshot(&mut events, |s| s.window_end == at(10, 0, 0)).await;
        assert_eq!(first.total_currency, 50);

        append_lines(file.path(), &["[24/11/25] [10:06:00]: You receive 1 Iron Ore."]);

        let second = wait_for_snapshot(&mut events, |s| s.window_end == at(10, 6, 0)).await;
        assert_eq!(second.window_start, at(10, 6, 0));
        assert_eq!(second.total_currency, 0);
        assert_eq!(second.items[0].name, "Iron Ore");

        session.stop().await;
    }

    #[tokio::test]
    async fn test_partial_line_is_completed_later() {
        let file = tempfile::NamedTempFile::new().unwrap();
        {
            let mut handle = std::fs::OpenOptions::new()
                .append(true)
                .open(file.path())
                .unwrap();
            write!(handle, "[24/11/25] [10:00:00]: You receive 12").unwrap();
            handle.flush().unwrap();
        }

        let mut session = MonitorSession::new();
        let mut events = start(&mut session, fast_config(file.path(), 60, true));

        tokio::time::sleep(Duration::from_millis(100)).await;
        append_lines(file.path(), &["3 Yang."]);

        let snapshot = wait_for_snapshot(&mut events, |_| true).await;
        assert_eq!(snapshot.total_currency, 123);

        session.stop().await;
    }

    #[tokio::test]
    async fn test_snapshots_are_in_order() {
        let file = tempfile::NamedTempFile::new().unwrap();
        append_lines(file.path(), &["[24/11/25] [10:00:00]: You receive 1 Yang."]);

        let mut session = MonitorSession::new();
        let mut events = start(&mut session, fast_config(file.path(), 60, true));

        let mut previous = wait_for_snapshot(&mut events, |_| true).await;
        for minute in 1..=3 {
            append_lines(
                file.path(),
                &[&format!("[24/11/25] [10:0{}:00]: You receive 1 Yang.", minute)],
            );
            let next = wait_for_snapshot(&mut events, |s| s.window_end == at(10, minute, 0)).await;
            assert!(next.window_end >= previous.window_end);
            previous = next;
        }
        assert_eq!(previous.total_currency, 4);

        session.stop().await;
    }

    #[tokio::test]
    async fn test_open_failure_is_reported_and_session_goes_idle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.log");

        let mut session = MonitorSession::new();
        let mut events = start(&mut session, fast_config(&path, 60, false));

        let event = tokio::time::timeout(WAIT_LIMIT, events.recv()).await.unwrap();
        match event {
            Some(MonitorEvent::OpenFailed { path: reported, error }) => {
                assert_eq!(reported, path);
                assert!(!error.is_empty());
            }
            other => panic!("expected OpenFailed, got {:?}", other),
        }
        // エラーは一度だけ
        assert!(tokio::time::timeout(WAIT_LIMIT, events.recv())
            .await
            .unwrap()
            .is_none());

        assert!(matches!(
            session.stop().await,
            StopOutcome::Stopped(summary) if summary.open_failed
        ));
        assert!(!session.is_running());
    }

    #[tokio::test]
    async fn test_new_start_gets_fresh_receiver() {
        let file = tempfile::NamedTempFile::new().unwrap();
        append_lines(file.path(), &["[24/11/25] [10:00:00]: You receive 7 Yang."]);

        let mut session = MonitorSession::new();
        let mut first = start(&mut session, fast_config(file.path(), 60, true));
        wait_for_snapshot(&mut first, |_| true).await;
        session.stop().await;

        // 停止後、古いレシーバーにはこれ以上届かない
        while let Ok(Some(_)) = tokio::time::timeout(Duration::from_millis(50), first.recv()).await {}
        assert!(first.recv().await.is_none());

        let mut second = start(&mut session, fast_config(file.path(), 60, true));
        let snapshot = wait_for_snapshot(&mut second, |_| true).await;
        // 新しいTailerは空のウィンドウから集計し直す
        assert_eq!(snapshot.total_currency, 7);

        session.stop().await;
    }
}
