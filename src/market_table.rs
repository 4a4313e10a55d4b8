use serde::Serialize;
use serde::de::{self, Deserializer, Visitor};
use serde_json::Value;
use std::fmt;

use crate::error::CycleError;
use crate::market_data::RawRecord;

/// One asset's snapshot for the current cycle.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MarketRecord {
    pub name: String,
    pub symbol: String,
    pub current_price: f64,
    pub market_cap: f64,
    pub total_volume: f64,
    pub price_change_percentage_24h: Option<f64>,
}

/// Records in the order the source returned them (market cap descending).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketTable {
    pub records: Vec<MarketRecord>,
}

/// Header row for a table priced in `currency`, in column order.
pub fn column_headers(currency: &str) -> [String; 6] {
    let cur = currency.to_uppercase();
    [
        "Name".to_string(),
        "Symbol".to_string(),
        format!("Current Price ({})", cur),
        format!("Market Cap ({})", cur),
        format!("24h Trading Volume ({})", cur),
        "24h Price Change (%)".to_string(),
    ]
}

struct LenientF64Visitor;

impl<'de> Visitor<'de> for LenientF64Visitor {
    type Value = Option<f64>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a finite float, an integer, or a string representing one")
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        if v.is_finite() {
            Ok(Some(v))
        } else {
            Err(E::custom(format!("{} is not a finite number", v)))
        }
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        let v = v.trim();
        if v.is_empty() {
            return Ok(None);
        }
        let parsed = v.parse::<f64>().map_err(E::custom)?;
        self.visit_f64(parsed)
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(None)
    }
}

// Absent, null and blank strings all come back as None.
fn lenient_f64(
    record: &RawRecord,
    index: usize,
    field: &'static str,
) -> Result<Option<f64>, CycleError> {
    let Some(value) = record.get(field) else {
        return Ok(None);
    };
    value
        .deserialize_any(LenientF64Visitor)
        .map_err(|e| CycleError::InvalidField {
            index,
            field,
            reason: e.to_string(),
        })
}

fn required_f64(record: &RawRecord, index: usize, field: &'static str) -> Result<f64, CycleError> {
    lenient_f64(record, index, field)?.ok_or(CycleError::MissingField { index, field })
}

fn required_str(
    record: &RawRecord,
    index: usize,
    field: &'static str,
) -> Result<String, CycleError> {
    match record.get(field) {
        None | Some(Value::Null) => Err(CycleError::MissingField { index, field }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(CycleError::InvalidField {
            index,
            field,
            reason: format!("expected a string, got {}", other),
        }),
    }
}

impl MarketRecord {
    pub fn from_raw(index: usize, raw: &RawRecord) -> Result<Self, CycleError> {
        Ok(Self {
            name: required_str(raw, index, "name")?,
            symbol: required_str(raw, index, "symbol")?,
            current_price: required_f64(raw, index, "current_price")?,
            market_cap: required_f64(raw, index, "market_cap")?,
            total_volume: required_f64(raw, index, "total_volume")?,
            price_change_percentage_24h: lenient_f64(raw, index, "price_change_percentage_24h")?,
        })
    }
}

impl MarketTable {
    /// Builds the table in source order. The first malformed record aborts the whole
    /// conversion.
    pub fn from_raw(raw: &[RawRecord]) -> Result<Self, CycleError> {
        let records = raw
            .iter()
            .enumerate()
            .map(|(index, item)| MarketRecord::from_raw(index, item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
