pub mod analysis;
pub mod error;
pub mod market_data;
pub mod market_table;
pub mod report;
pub mod scheduler;
pub mod spreadsheet;
pub mod storage_utils;
