//! Per-cycle statistics over a [`MarketTable`].

use std::cmp::Ordering;

use crate::error::CycleError;
use crate::market_table::{MarketRecord, MarketTable};

/// Derived view of one table. Borrowed from the table and dropped with it.
#[derive(Debug, PartialEq)]
pub struct CycleSummary<'a> {
    /// Largest market caps first, ties kept in table order.
    pub top: Vec<&'a MarketRecord>,
    /// Unweighted mean of every current price.
    pub mean_price: f64,
    /// `None` when no record reports a 24h change.
    pub highest_change: Option<&'a MarketRecord>,
    pub lowest_change: Option<&'a MarketRecord>,
}

/// First record whose change beats every earlier one under `better`.
fn first_extreme(
    records: &[MarketRecord],
    better: impl Fn(f64, f64) -> bool,
) -> Option<&MarketRecord> {
    let mut best: Option<(&MarketRecord, f64)> = None;
    for record in records {
        let Some(change) = record.price_change_percentage_24h else {
            continue;
        };
        match best {
            Some((_, current)) if !better(change, current) => {}
            _ => best = Some((record, change)),
        }
    }
    best.map(|(record, _)| record)
}

pub fn summarize(table: &MarketTable, top_n: usize) -> Result<CycleSummary<'_>, CycleError> {
    if table.is_empty() {
        return Err(CycleError::EmptyTable);
    }

    // sort_by is stable, so equal caps keep their table order.
    let mut top: Vec<&MarketRecord> = table.records.iter().collect();
    top.sort_by(|a, b| {
        b.market_cap
            .partial_cmp(&a.market_cap)
            .unwrap_or(Ordering::Equal)
    });
    top.truncate(top_n);

    let mean_price =
        table.records.iter().map(|r| r.current_price).sum::<f64>() / table.len() as f64;

    Ok(CycleSummary {
        top,
        mean_price,
        highest_change: first_extreme(&table.records, |a, b| a > b),
        lowest_change: first_extreme(&table.records, |a, b| a < b),
    })
}
