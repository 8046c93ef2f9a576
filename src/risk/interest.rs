//! Interest accrual
//!
//! Simple non-compounding accrual, fully re-derivable from stored loan fields
//! at any instant. There is no background accrual job: every read recomputes
//! interest from the origination timestamp, so the ledger can never serve a
//! stale owed amount.
//!
//! All arithmetic is `Decimal`. Rounding happens at the presentation boundary
//! only; callers get full precision.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::params::BPS_SCALE;

/// Seconds in a 365-day year, the accrual denominator
pub const SECONDS_PER_YEAR: i64 = 31_536_000;

/// Principal still outstanding after repayments, floored at zero
pub fn outstanding_principal(principal: Decimal, cumulative_repaid: Decimal) -> Decimal {
    (principal - cumulative_repaid).max(Decimal::ZERO)
}

/// Interest accrued between origination and `now` on the outstanding
/// principal: `outstanding * apr * elapsed_seconds / seconds_per_year`.
///
/// Elapsed time clamps at zero so a clock reading before origination never
/// produces negative interest.
pub fn accrued_interest(
    principal: Decimal,
    cumulative_repaid: Decimal,
    interest_rate_bps: i32,
    originated_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Decimal {
    let outstanding = outstanding_principal(principal, cumulative_repaid);
    if outstanding.is_zero() {
        return Decimal::ZERO;
    }

    let elapsed_seconds = (now - originated_at).num_seconds().max(0);
    let apr = Decimal::from(interest_rate_bps) / BPS_SCALE;

    outstanding * apr * Decimal::from(elapsed_seconds) / Decimal::from(SECONDS_PER_YEAR)
}

/// Total owed at `now`: outstanding principal plus accrued interest.
/// Never negative.
pub fn total_owed(
    principal: Decimal,
    cumulative_repaid: Decimal,
    interest_rate_bps: i32,
    originated_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Decimal {
    outstanding_principal(principal, cumulative_repaid)
        + accrued_interest(
            principal,
            cumulative_repaid,
            interest_rate_bps,
            originated_at,
            now,
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn origination() -> DateTime<Utc> {
        "2026-01-01T00:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_accrual_32_days() {
        // 22.6 borrowed at 8.5% APR for 32 days:
        // 22.6 * 0.085 * (32/365) = 0.1684...
        let now = origination() + Duration::days(32);
        let accrued = accrued_interest(dec!(22.6), Decimal::ZERO, 850, origination(), now);

        assert_eq!(accrued.round_dp(4), dec!(0.1684));

        let owed = total_owed(dec!(22.6), Decimal::ZERO, 850, origination(), now);
        assert_eq!(owed.round_dp(3), dec!(22.768));
    }

    #[test]
    fn test_no_elapsed_time_no_interest() {
        let accrued = accrued_interest(dec!(100), Decimal::ZERO, 850, origination(), origination());
        assert_eq!(accrued, Decimal::ZERO);
    }

    #[test]
    fn test_clock_before_origination_clamps() {
        let before = origination() - Duration::hours(1);
        let accrued = accrued_interest(dec!(100), Decimal::ZERO, 850, origination(), before);
        assert_eq!(accrued, Decimal::ZERO);
    }

    #[test]
    fn test_fully_repaid_principal_stops_accruing() {
        let now = origination() + Duration::days(100);
        let accrued = accrued_interest(dec!(100), dec!(100), 850, origination(), now);
        assert_eq!(accrued, Decimal::ZERO);
    }

    #[test]
    fn test_over_repaid_principal_never_negative() {
        let now = origination() + Duration::days(10);
        assert_eq!(
            outstanding_principal(dec!(100), dec!(150)),
            Decimal::ZERO
        );
        assert_eq!(
            total_owed(dec!(100), dec!(150), 850, origination(), now),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_partial_repayment_reduces_accrual_base() {
        let now = origination() + Duration::days(365);
        // Full principal accrues 8.5 over a year; half the principal accrues half.
        let full = accrued_interest(dec!(100), Decimal::ZERO, 850, origination(), now);
        let half = accrued_interest(dec!(100), dec!(50), 850, origination(), now);
        assert_eq!(full, dec!(8.5));
        assert_eq!(half, dec!(4.25));
    }
}
