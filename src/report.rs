use chrono::{DateTime, Local};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_BORDERS_ONLY,
};

use crate::analysis::CycleSummary;
use crate::market_table::MarketRecord;

fn format_timestamp(at: DateTime<Local>) -> String {
    at.format("%d-%m-%Y %H:%M:%S").to_string()
}

fn change_line(label: &str, record: Option<&MarketRecord>) -> String {
    match record.and_then(|r| r.price_change_percentage_24h.map(|pct| (r, pct))) {
        Some((r, pct)) => format!("{} 24h Change: {} with {:.2}%", label, r.name, pct),
        None => format!("{} 24h Change: unavailable", label),
    }
}

fn top_table(summary: &CycleSummary<'_>, currency: &str) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Rank").add_attribute(Attribute::Bold),
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Symbol").add_attribute(Attribute::Bold),
            Cell::new(format!("Market Cap ({})", currency.to_uppercase()))
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
        ]);

    for (i, record) in summary.top.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1).fg(Color::DarkGrey),
            Cell::new(&record.name).fg(Color::Cyan),
            Cell::new(record.symbol.to_uppercase()),
            Cell::new(format!("{:.2}", record.market_cap)).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

/// Renders the human-readable cycle report.
pub fn render(summary: &CycleSummary<'_>, currency: &str, taken_at: DateTime<Local>) -> String {
    format!(
        "\n(Data taken at {})\nTop {} Cryptocurrencies by Market Cap:\n{}\n\nAverage price: {:.2} {}\n{}\n{}",
        format_timestamp(taken_at),
        summary.top.len(),
        top_table(summary, currency),
        summary.mean_price,
        currency.to_uppercase(),
        change_line("Highest", summary.highest_change),
        change_line("Lowest", summary.lowest_change),
    )
}
