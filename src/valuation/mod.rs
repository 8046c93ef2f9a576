//! Collateral valuation provider
//!
//! The engine never prices collateral itself: value is an injected input
//! observed from an external oracle. This module owns the seam - a trait the
//! lending service consumes, and the HTTP implementation that queries the
//! configured oracle endpoint. Freshness enforcement lives on the
//! `Valuation` itself so every consumer applies the same policy.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{LendingError, LendingResult};
use crate::models::Valuation;

/// Source of current collateral values
#[async_trait]
pub trait ValuationProvider: Send + Sync {
    /// Latest observed value for an asset
    async fn current_value(&self, asset_id: &str) -> LendingResult<Valuation>;
}

/// Quote payload returned by the valuation oracle API
#[derive(Debug, Deserialize)]
struct OracleQuote {
    asset_id: String,
    value: Decimal,
    observed_at: DateTime<Utc>,
}

/// Valuation provider backed by the platform's price oracle HTTP API
pub struct HttpValuationProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpValuationProvider {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    async fn fetch_quote(&self, asset_id: &str) -> anyhow::Result<OracleQuote> {
        let url = format!("{}/api/valuations/{}", self.base_url, asset_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Valuation oracle request failed")?
            .error_for_status()
            .context("Valuation oracle returned an error status")?;

        let quote = response
            .json::<OracleQuote>()
            .await
            .context("Failed to decode valuation oracle response")?;

        Ok(quote)
    }
}

#[async_trait]
impl ValuationProvider for HttpValuationProvider {
    async fn current_value(&self, asset_id: &str) -> LendingResult<Valuation> {
        let quote = self
            .fetch_quote(asset_id)
            .await
            .map_err(|e| LendingError::ValuationUnavailable(format!("{:#}", e)))?;

        tracing::debug!(
            asset_id = %quote.asset_id,
            value = %quote.value,
            observed_at = %quote.observed_at,
            "Fetched collateral valuation"
        );

        Ok(Valuation {
            asset_id: quote.asset_id,
            value: quote.value,
            observed_at: quote.observed_at,
        })
    }
}
