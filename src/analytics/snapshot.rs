use crate::analytics::event_window::EventWindow;
use crate::io::LootEvent;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const SECONDS_PER_HOUR: f64 = 3600.0;
const SECONDS_PER_MINUTE: f64 = 60.0;

/// アイテム別の集計
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStats {
    /// アイテム名
    pub name: String,
    /// ウィンドウ内の合計数量
    pub total_quantity: u64,
    /// 1時間あたりの数量
    pub per_hour: u64,
}

/// ある時点のウィンドウから計算した統計スナップショット
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// ウィンドウ内で最も古いイベントの時刻
    pub window_start: NaiveDateTime,
    /// ウィンドウ内で最も新しいイベントの時刻
    pub window_end: NaiveDateTime,
    /// 経過秒数（最低1秒）
    pub elapsed_seconds: u64,
    /// Yang合計
    pub total_currency: u64,
    /// 1時間あたりのYang
    pub currency_per_hour: u64,
    /// 1分あたりのYang
    pub currency_per_minute: u64,
    /// 数量の多い順に並んだアイテム別集計
    pub items: Vec<ItemStats>,
}

impl StatsSnapshot {
    /// 時系列順のイベント列から統計を計算
    ///
    /// イベントがひとつもなければ `None`。
    pub fn from_events<'a, I>(events: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a LootEvent>,
    {
        let mut window_bounds: Option<(NaiveDateTime, NaiveDateTime)> = None;
        let mut total_currency = 0u64;
        // 初出順を保ったままアイテム別に合計する
        let mut item_totals: Vec<(&str, u64)> = Vec::new();
        let mut item_index: HashMap<&str, usize> = HashMap::new();

        for event in events {
            window_bounds = match window_bounds {
                None => Some((event.timestamp, event.timestamp)),
                Some((start, _)) => Some((start, event.timestamp)),
            };

            if event.is_currency() {
                total_currency = total_currency.saturating_add(event.quantity);
                continue;
            }

            match item_index.get(event.item.as_str()) {
                Some(&index) => {
                    let total = &mut item_totals[index].1;
                    *total = total.saturating_add(event.quantity);
                }
                None => {
                    item_index.insert(event.item.as_str(), item_totals.len());
                    item_totals.push((event.item.as_str(), event.quantity));
                }
            }
        }

        let (window_start, window_end) = window_bounds?;
        let elapsed_seconds = elapsed_seconds(window_start, window_end);

        let mut items: Vec<ItemStats> = item_totals
            .into_iter()
            .map(|(name, total_quantity)| ItemStats {
                name: name.to_string(),
                total_quantity,
                per_hour: scaled_rate(total_quantity, SECONDS_PER_HOUR, elapsed_seconds),
            })
            .collect();
        // 安定ソートなので同数のアイテムは初出順のまま
        items.sort_by(|a, b| b.total_quantity.cmp(&a.total_quantity));

        Some(Self {
            window_start,
            window_end,
            elapsed_seconds,
            total_currency,
            currency_per_hour: scaled_rate(total_currency, SECONDS_PER_HOUR, elapsed_seconds),
            currency_per_minute: scaled_rate(total_currency, SECONDS_PER_MINUTE, elapsed_seconds),
            items,
        })
    }

    /// ウィンドウの長さ（時間）
    pub fn window_hours(&self) -> f64 {
        self.elapsed_seconds as f64 / SECONDS_PER_HOUR
    }

    /// ウィンドウの長さ（分）
    pub fn window_minutes(&self) -> f64 {
        self.elapsed_seconds as f64 / SECONDS_PER_MINUTE
    }
}

/// ウィンドウの内容からスナップショットを計算
///
/// ウィンドウを変更しないので、同じ内容に対して何度呼んでも同じ結果になる。
pub fn compute_snapshot(window: &EventWindow) -> Option<StatsSnapshot> {
    if window.is_empty() {
        return None;
    }
    StatsSnapshot::from_events(window)
}

/// 開始・終了時刻の差（秒）。ゼロ除算を避けるため最低1秒
fn elapsed_seconds(start: NaiveDateTime, end: NaiveDateTime) -> u64 {
    u64::try_from((end - start).num_seconds()).unwrap_or(0).max(1)
}

/// `quantity` を `unit_seconds` あたりの値に換算し、四捨五入（0.5は切り上げ）
fn scaled_rate(quantity: u64, unit_seconds: f64, elapsed_seconds: u64) -> u64 {
    (quantity as f64 * unit_seconds / elapsed_seconds as f64).round() as u64
}
