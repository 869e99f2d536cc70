use crate::io::LootEvent;
use chrono::TimeDelta;
use std::collections::VecDeque;

/// 直近の一定時間分だけイベントを保持するスライディングウィンドウ
///
/// ログは時系列順に追記される前提なので、並べ替えは行わず到着順をそのまま時刻順として扱う。
#[derive(Debug, Clone)]
pub struct EventWindow {
    /// 到着順（＝時刻の昇順）のイベント
    events: VecDeque<LootEvent>,
    /// ウィンドウの長さ
    duration: TimeDelta,
}

impl EventWindow {
    /// 指定した長さの空ウィンドウを作成
    pub fn new(duration: TimeDelta) -> Self {
        Self {
            events: VecDeque::new(),
            duration,
        }
    }

    /// 分単位で長さを指定して作成
    pub fn with_minutes(minutes: u32) -> Self {
        Self::new(TimeDelta::minutes(i64::from(minutes)))
    }

    /// イベントを末尾に追加し、範囲外になった先頭のイベントを削除
    pub fn append(&mut self, event: LootEvent) {
        // 日付の表現範囲を超える長さなら何も削除しない
        let cutoff = event.timestamp.checked_sub_signed(self.duration);
        self.events.push_back(event);

        let Some(cutoff) = cutoff else {
            return;
        };
        while self
            .events
            .front()
            .is_some_and(|oldest| oldest.timestamp < cutoff)
        {
            self.events.pop_front();
        }
    }

    /// 保持中のイベントを古い順に参照
    pub fn iter(&self) -> std::collections::vec_deque::Iter<'_, LootEvent> {
        self.events.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// 最も古いイベント
    pub fn first(&self) -> Option<&LootEvent> {
        self.events.front()
    }

    /// 最も新しいイベント
    pub fn last(&self) -> Option<&LootEvent> {
        self.events.back()
    }

    pub fn duration(&self) -> TimeDelta {
        self.duration
    }

    /// 全イベントを破棄
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl<'a> IntoIterator for &'a EventWindow {
    type Item = &'a LootEvent;
    type IntoIter = std::collections::vec_deque::Iter<'a, LootEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
