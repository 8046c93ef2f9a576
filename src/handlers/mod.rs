//! HTTP request handlers

pub mod loans;
pub mod risk_params;

pub use loans::*;
pub use risk_params::*;
