//! 統計スナップショットの表示
//!
//! テキスト表示（桁区切り・アイテム表）とNDJSON出力を提供する。

use crate::analytics::StatsSnapshot;
use crate::error::MonitorResult;
use std::io::Write;

/// 出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    /// 1スナップショット1行のJSON
    Json,
}

/// 3桁ごとにカンマを入れる（例: 1234567 → "1,234,567"）
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut formatted = String::with_capacity(digits.len() + digits.len() / 3);

    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(digit);
    }

    formatted
}

/// スナップショットをテキストで描画
pub fn render_snapshot(snapshot: &StatsSnapshot) -> String {
    let mut lines = vec![
        format!(
            "Interval: {} → {}",
            snapshot.window_start.format("%H:%M:%S"),
            snapshot.window_end.format("%H:%M:%S")
        ),
        format!(
            "Window: {:.2} h ({:.1} min)",
            snapshot.window_hours(),
            snapshot.window_minutes()
        ),
        format!(
            "Total Yang: {}    Yang / Hour: {}    Yang / Minute: {}",
            format_thousands(snapshot.total_currency),
            format_thousands(snapshot.currency_per_hour),
            format_thousands(snapshot.currency_per_minute)
        ),
    ];

    if snapshot.items.is_empty() {
        lines.push("No items collected".to_string());
    } else {
        let name_width = snapshot
            .items
            .iter()
            .map(|item| item.name.chars().count())
            .max()
            .unwrap_or(0)
            .max("Item Name".len());

        lines.push(format!(
            "{:<width$}  {:>12}  {:>15}",
            "Item Name",
            "Quantity",
            "Quantity / Hour",
            width = name_width
        ));
        for item in &snapshot.items {
            lines.push(format!(
                "{:<width$}  {:>12}  {:>15}",
                item.name,
                format_thousands(item.total_quantity),
                format_thousands(item.per_hour),
                width = name_width
            ));
        }
    }

    lines.join("\n")
}

/// スナップショットを指定形式で書き出す
pub fn write_snapshot<W: Write>(
    writer: &mut W,
    snapshot: &StatsSnapshot,
    format: OutputFormat,
) -> MonitorResult<()> {
    match format {
        OutputFormat::Text => {
            writeln!(writer, "{}", render_snapshot(snapshot))?;
            writeln!(writer)?;
        }
        OutputFormat::Json => {
            let json_line = serde_json::to_string(snapshot)?;
            writeln!(writer, "{}", json_line)?;
        }
    }
    writer.flush()?;
    Ok(())
}
