//! Shared data models for the RelicVault backend

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A non-fungible asset offered or pledged as loan collateral.
///
/// The `asset_id` is the canonical `collection:token` identifier used by the
/// pledge registry and the valuation oracle. An asset is exclusively owned by
/// one loan while pledged and free otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollateralAsset {
    pub collection_id: String,
    pub token_id: String,
}

impl CollateralAsset {
    pub fn new(collection_id: impl Into<String>, token_id: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            token_id: token_id.into(),
        }
    }

    /// Canonical `collection:token` identifier
    pub fn asset_id(&self) -> String {
        format!("{}:{}", self.collection_id, self.token_id)
    }

    /// Parse a canonical `collection:token` identifier
    pub fn parse(asset_id: &str) -> Option<Self> {
        let (collection, token) = asset_id.split_once(':')?;
        if collection.is_empty() || token.is_empty() {
            return None;
        }
        Some(Self::new(collection, token))
    }
}

/// A collateral valuation observed from the price oracle.
///
/// Price is an injected input: the engine never fetches or caches one on its
/// own schedule, it only checks the observation is fresh enough to act on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Valuation {
    pub asset_id: String,
    pub value: Decimal,
    pub observed_at: DateTime<Utc>,
}

impl Valuation {
    /// Age of the observation at `now`, in whole seconds
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.observed_at).num_seconds()
    }

    /// Reject observations older than the configured freshness window.
    /// Used by `open_loan` and `liquidate`; quotes and previews may act on
    /// whatever the oracle last reported.
    pub fn ensure_fresh(
        &self,
        now: DateTime<Utc>,
        max_age_seconds: i64,
    ) -> Result<(), crate::error::LendingError> {
        let age = self.age_seconds(now);
        if age > max_age_seconds {
            return Err(crate::error::LendingError::StaleValuation {
                asset_id: self.asset_id.clone(),
                age_seconds: age,
                max_age_seconds,
            });
        }
        Ok(())
    }
}

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Paginated response wrapper
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i32,
    pub limit: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_asset_id_round_trip() {
        let asset = CollateralAsset::new("meridian-masks", "742");
        assert_eq!(asset.asset_id(), "meridian-masks:742");
        assert_eq!(CollateralAsset::parse("meridian-masks:742"), Some(asset));
    }

    #[test]
    fn test_parse_rejects_malformed_ids() {
        assert_eq!(CollateralAsset::parse("no-separator"), None);
        assert_eq!(CollateralAsset::parse(":7"), None);
        assert_eq!(CollateralAsset::parse("masks:"), None);
    }

    #[test]
    fn test_valuation_freshness_window() {
        let now = Utc::now();
        let valuation = Valuation {
            asset_id: "meridian-masks:742".to_string(),
            value: dec!(45.2),
            observed_at: now - chrono::Duration::seconds(90),
        };

        assert!(valuation.ensure_fresh(now, 120).is_ok());
        assert!(valuation.ensure_fresh(now, 60).is_err());
    }
}
