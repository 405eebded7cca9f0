pub mod currency;

use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::catalog::PackageId;

/// Off-season promotional window: November through February, 15% off the
/// tax-inclusive total before the breakdown is recomputed.
const OFF_SEASON_DISCOUNT: Decimal = dec!(0.15);

/// Tax-inclusive/exclusive breakdown for one package booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TaxBreakdown {
    pub base_price: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total_price: Decimal,
}

/// Rounds to 2 decimal places, midpoint away from zero. Every intermediate
/// monetary value goes through this before reuse.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Breakdown from a tax-exclusive base price.
pub fn tax_breakdown(base_price: Decimal, tax_rate: Decimal) -> TaxBreakdown {
    let base_price = round2(base_price);
    let tax_amount = round2(base_price * tax_rate);
    TaxBreakdown {
        base_price,
        tax_rate,
        tax_amount,
        total_price: base_price + tax_amount,
    }
}

/// Breakdown from a tax-inclusive total. This is the primary path since
/// catalog prices are stored tax-inclusive; the base is derived by
/// division, not subtraction-first.
pub fn tax_breakdown_from_total(total_price: Decimal, tax_rate: Decimal) -> TaxBreakdown {
    let total_price = round2(total_price);
    let base_price = round2(total_price / (Decimal::ONE + tax_rate));
    TaxBreakdown {
        base_price,
        tax_rate,
        tax_amount: total_price - base_price,
        total_price,
    }
}

/// Discount fraction applying to a booking date, if any.
pub fn seasonal_discount(booking_date: NaiveDate) -> Option<Decimal> {
    match booking_date.month() {
        11 | 12 | 1 | 2 => Some(OFF_SEASON_DISCOUNT),
        _ => None,
    }
}

/// Full pricing for a package booking: per-person multiplication for
/// per-person packages, then the seasonal adjustment, then the breakdown
/// of the resulting tax-inclusive total.
pub fn package_pricing(
    package_id: PackageId,
    tax_rate: Decimal,
    booking_date: Option<NaiveDate>,
    people_count: Option<u32>,
) -> TaxBreakdown {
    let package = package_id.package();

    let mut total = package.total_price_eur;
    if package.per_person {
        let people = people_count.unwrap_or(1).max(1);
        total = round2(total * Decimal::from(people));
    }

    if let Some(discount) = booking_date.and_then(seasonal_discount) {
        total = round2(total * (Decimal::ONE - discount));
    }

    tax_breakdown_from_total(total, tax_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn essential_breakdown_at_twenty_percent() {
        let breakdown = package_pricing(PackageId::Essential, dec!(0.20), None, None);
        assert_eq!(breakdown.base_price, dec!(125.00));
        assert_eq!(breakdown.tax_amount, dec!(25.00));
        assert_eq!(breakdown.total_price, dec!(150.00));
    }

    #[test]
    fn rooftop_multiplies_by_people_count() {
        // Mid-season date so no discount interferes
        let date = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let breakdown = package_pricing(PackageId::Rooftop, dec!(0.20), Some(date), Some(3));
        assert_eq!(breakdown.total_price, dec!(450.00));
    }

    #[test]
    fn rooftop_defaults_to_one_person() {
        let breakdown = package_pricing(PackageId::Rooftop, dec!(0.20), None, None);
        assert_eq!(breakdown.total_price, dec!(150.00));
    }

    #[test]
    fn off_season_discount_applies_before_breakdown() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 10).unwrap();
        let breakdown = package_pricing(PackageId::Essential, dec!(0.20), Some(date), None);
        // 150 * 0.85 = 127.50
        assert_eq!(breakdown.total_price, dec!(127.50));
        assert_eq!(
            breakdown.base_price + breakdown.tax_amount,
            breakdown.total_price
        );
    }

    #[test]
    fn june_has_no_discount() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(seasonal_discount(date), None);
        let november = NaiveDate::from_ymd_opt(2025, 11, 1).unwrap();
        assert_eq!(seasonal_discount(november), Some(dec!(0.15)));
    }

    #[test]
    fn breakdown_parts_always_sum_exactly() {
        for id in PackageId::ALL {
            for rate in [dec!(0), dec!(0.08), dec!(0.18), dec!(0.20), dec!(1)] {
                let b = package_pricing(id, rate, None, Some(2));
                assert_eq!(b.base_price + b.tax_amount, b.total_price);
            }
        }
    }

    proptest! {
        #[test]
        fn breakdown_round_trips_within_a_cent(
            base_cents in 0u64..5_000_000,
            rate_bps in 0u32..=10_000,
        ) {
            let base = Decimal::from(base_cents) / dec!(100);
            let rate = Decimal::from(rate_bps) / dec!(10000);

            let forward = tax_breakdown(base, rate);
            let back = tax_breakdown_from_total(forward.total_price, rate);

            let delta = (back.base_price - base).abs();
            prop_assert!(delta <= dec!(0.01), "delta {} too large", delta);
        }

        #[test]
        fn from_total_parts_sum_exactly(
            total_cents in 0u64..5_000_000,
            rate_bps in 0u32..=10_000,
        ) {
            let total = Decimal::from(total_cents) / dec!(100);
            let rate = Decimal::from(rate_bps) / dec!(10000);

            let b = tax_breakdown_from_total(total, rate);
            prop_assert_eq!(b.base_price + b.tax_amount, b.total_price);
        }
    }
}
