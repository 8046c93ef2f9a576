//! Settlement layer seam
//!
//! Actual custody transfer and fund movement happen on-chain, outside this
//! engine. The ledger transitions only on explicit confirmation: mutating
//! requests carry the hash of an already-confirmed settlement transaction,
//! and this module verifies it against the settlement RPC before the ledger
//! is touched. A reverted or unknown transaction is a hard failure, never
//! silently treated as success. Retries belong to the settlement side.
//!
//! In the other direction the engine produces `SettlementInstruction` tuples
//! describing what must move on-chain next (principal disbursement,
//! collateral release, collateral seizure).

use anyhow::Context;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LendingError, LendingResult};
use crate::ledger::model::Loan;

/// What an instruction moves and why
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SettlementPurpose {
    /// Send the borrowed principal to the borrower
    DisbursePrincipal,
    /// Return pledged collateral to the borrower after full repayment
    ReleaseCollateral,
    /// Transfer pledged collateral to the liquidating party
    SeizeCollateral,
}

/// A transfer the settlement layer must perform on-chain
#[derive(Debug, Clone, Serialize)]
pub struct SettlementInstruction {
    pub purpose: SettlementPurpose,
    pub collateral_asset: String,
    pub borrow_token: String,
    pub amount: Decimal,
    pub counterparty: String,
}

impl SettlementInstruction {
    pub fn disburse_principal(loan: &Loan) -> Self {
        Self {
            purpose: SettlementPurpose::DisbursePrincipal,
            collateral_asset: loan.asset_id.clone(),
            borrow_token: loan.borrow_token.clone(),
            amount: loan.principal,
            counterparty: loan.borrower_id.to_string(),
        }
    }

    pub fn release_collateral(loan: &Loan) -> Self {
        Self {
            purpose: SettlementPurpose::ReleaseCollateral,
            collateral_asset: loan.asset_id.clone(),
            borrow_token: loan.borrow_token.clone(),
            amount: Decimal::ZERO,
            counterparty: loan.borrower_id.to_string(),
        }
    }

    pub fn seize_collateral(loan: &Loan, liquidator: &str) -> Self {
        Self {
            purpose: SettlementPurpose::SeizeCollateral,
            collateral_asset: loan.asset_id.clone(),
            borrow_token: loan.borrow_token.clone(),
            amount: Decimal::ZERO,
            counterparty: liquidator.to_string(),
        }
    }
}

/// Settlement transaction verifier
#[async_trait]
pub trait SettlementLayer: Send + Sync {
    /// Confirm a settlement transaction landed successfully.
    /// Fails with `SettlementFailed` when the transaction reverted, is
    /// unknown, or the RPC cannot be reached.
    async fn verify_confirmation(&self, tx_hash: &str) -> LendingResult<()>;
}

/// Transaction status payload from the settlement RPC
#[derive(Debug, Deserialize)]
struct TxStatus {
    status: String,
}

/// Settlement layer backed by the chain RPC
pub struct HttpSettlementLayer {
    client: reqwest::Client,
    rpc_url: String,
}

impl HttpSettlementLayer {
    pub fn new(rpc_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            rpc_url,
        }
    }

    async fn fetch_status(&self, tx_hash: &str) -> anyhow::Result<TxStatus> {
        let url = format!("{}/api/transactions/{}", self.rpc_url, tx_hash);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Settlement RPC request failed")?
            .error_for_status()
            .context("Settlement RPC returned an error status")?;

        let status = response
            .json::<TxStatus>()
            .await
            .context("Failed to decode settlement RPC response")?;

        Ok(status)
    }
}

#[async_trait]
impl SettlementLayer for HttpSettlementLayer {
    async fn verify_confirmation(&self, tx_hash: &str) -> LendingResult<()> {
        let tx = self
            .fetch_status(tx_hash)
            .await
            .map_err(|e| LendingError::SettlementFailed(format!("{:#}", e)))?;

        match tx.status.as_str() {
            "confirmed" => Ok(()),
            other => Err(LendingError::SettlementFailed(format!(
                "transaction {} is {}, expected confirmed",
                tx_hash, other
            ))),
        }
    }
}
