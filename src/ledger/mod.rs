//! Loan ledger for RelicVault
//!
//! Sole owner of loan state. `model` holds the records and the pure
//! state-transition arithmetic; `service` persists them and enforces
//! per-loan mutual exclusion between concurrent writers.

pub mod model;
pub mod service;

pub use model::{
    ListLoansQuery, Loan, LoanStatus, OpenLoanRequest, RepayRequest, RepaymentPlan,
    RepaymentPreview, RepaymentRecord,
};
pub use service::{LoanLedger, RepaymentOutcome};
