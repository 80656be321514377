//! Output formatting utilities for the CLI.

use comfy_table::{presets, Attribute, Cell, ContentArrangement, Table};
use serde::Serialize;

use crate::domain::models::CacheStatistics;

/// Result of a command, printable for humans or as JSON
pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;
    fn to_json(&self) -> serde_json::Value;
}

/// Print `result` in the selected mode
pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Render cache counters as a two-column table
pub fn format_stats_table(stats: &CacheStatistics) -> String {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Metric").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);

    let rows = [
        ("Hits", stats.hits.to_string()),
        ("Misses", stats.misses.to_string()),
        ("Hit rate", format!("{:.1}%", stats.hit_rate() * 100.0)),
        ("Sets", stats.sets.to_string()),
        ("Evictions", stats.evictions.to_string()),
        ("Expirations", stats.expirations.to_string()),
        ("Size", format!("{}/{}", stats.size, stats.max_size)),
    ];
    for (metric, value) in rows {
        table.add_row(vec![Cell::new(metric), Cell::new(value)]);
    }

    table.to_string()
}
