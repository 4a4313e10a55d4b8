use reqwest::Client;
use serde_json::{Map, Value};

use crate::error::CycleError;
use crate::storage_utils::ApiConfig;

/// One asset object exactly as the markets endpoint returned it.
pub type RawRecord = Map<String, Value>;

/// Pulls a single page of market data per call.
pub struct MarketFetcher {
    client: Client,
    config: ApiConfig,
}

impl MarketFetcher {
    pub fn new(config: ApiConfig) -> Result<Self, CycleError> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self { client, config })
    }

    fn query(&self) -> [(&'static str, String); 4] {
        [
            ("vs_currency", self.config.vs_currency.clone()),
            ("order", self.config.order.clone()),
            ("per_page", self.config.per_page.to_string()),
            ("page", self.config.page.to_string()),
        ]
    }

    pub async fn try_fetch(&self) -> Result<Vec<RawRecord>, CycleError> {
        let response = self
            .client
            .get(&self.config.url)
            .query(&self.query())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CycleError::Status(status));
        }

        Ok(response.json::<Vec<RawRecord>>().await?)
    }

    /// Fetches the page, logging any failure and returning an empty Vec in its place.
    pub async fn fetch(&self) -> Vec<RawRecord> {
        match self.try_fetch().await {
            Ok(records) => {
                tracing::info!(records = records.len(), "fetched market data");
                records
            }
            Err(e) => {
                tracing::warn!(error = %e, url = %self.config.url, "error fetching data");
                Vec::new()
            }
        }
    }
}
