//! Primary draw with secondary backfill.

use log::trace;

use crate::budget::ResourceBudget;

/// Result of one arbitration pass.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Arbitration {
    /// Logical MW received from both sources.
    pub granted: f64,
    pub from_primary: f64,
    pub from_secondary: f64,
    /// Fraction of the request that was met, in [0, 1].
    pub fulfillment: f64,
}

#[derive(Clone, Copy, Debug)]
pub struct PowerArbiter {
    /// Fill ratio below which the secondary pool is off limits.
    pub secondary_reserve_ratio: f64,
}

impl PowerArbiter {
    pub fn new(secondary_reserve_ratio: f64) -> Self {
        Self {
            secondary_reserve_ratio: secondary_reserve_ratio.clamp(0.0, 1.0),
        }
    }

    /// Satisfy `requirement` (MW) over `dt` seconds.
    ///
    /// The primary source is asked first. Any shortfall is backfilled from
    /// the secondary source, but only while its fill ratio is above the
    /// reserve floor, and never by more than would take it down to that
    /// floor.
    pub fn satisfy(
        &self,
        requirement: f64,
        primary: &mut ResourceBudget<'_>,
        secondary: Option<&mut ResourceBudget<'_>>,
        dt: f64,
    ) -> Arbitration {
        let from_primary = if requirement > 0.0 {
            primary.request(requirement, dt)
        } else {
            0.0
        };
        let mut granted = from_primary;
        let mut fulfillment = met_ratio(granted, requirement);

        let mut from_secondary = 0.0;
        if let Some(secondary) = secondary {
            if fulfillment < 1.0 && secondary.is_enabled() && dt > 0.0 {
                let ratio = secondary.available_ratio();
                if ratio > self.secondary_reserve_ratio {
                    let (amount, capacity) = secondary.stored();
                    let shortage = (1.0 - fulfillment) * requirement;
                    let max_draw = (amount - self.secondary_reserve_ratio * capacity).max(0.0);
                    let wanted = shortage * secondary.exchange_rate() * dt;
                    let received = secondary.request_native(max_draw.min(wanted));
                    from_secondary = received / dt;
                    granted += from_secondary;
                    fulfillment = met_ratio(granted, requirement);
                    trace!(
                        "secondary backfill: shortage={shortage:.4} MW, headroom={max_draw:.4}, received={from_secondary:.4} MW"
                    );
                }
            }
        }

        Arbitration {
            granted,
            from_primary,
            from_secondary,
            fulfillment: fulfillment.clamp(0.0, 1.0),
        }
    }
}

/// `granted / requirement`, or 1 when nothing was required.
pub fn met_ratio(granted: f64, requirement: f64) -> f64 {
    if requirement > 0.0 {
        granted / requirement
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::testing::FixedLedger;
    use crate::budget::Accounting;

    #[test]
    fn full_primary_needs_no_backfill() {
        let mut p = FixedLedger::new(100.0, 100.0);
        let mut s = FixedLedger::new(1000.0, 1000.0);
        let mut primary = ResourceBudget::new(&mut p, 1.0, Accounting::Direct);
        let mut secondary = ResourceBudget::new(&mut s, 1000.0, Accounting::Direct);

        let a = PowerArbiter::new(0.9).satisfy(10.0, &mut primary, Some(&mut secondary), 1.0);
        assert_eq!(a.fulfillment, 1.0);
        assert_eq!(a.from_secondary, 0.0);
        assert!(s.draws.is_empty());
    }

    #[test]
    fn backfill_is_bounded_by_reserve_floor() {
        // requirement 10, primary grants 6, secondary at 95% with a 90% floor
        let mut p = FixedLedger::new(6.0, 100.0);
        let mut s = FixedLedger::new(950.0, 1000.0);
        let mut primary = ResourceBudget::new(&mut p, 1.0, Accounting::Direct);
        let mut secondary = ResourceBudget::new(&mut s, 1000.0, Accounting::Direct);

        let a = PowerArbiter::new(0.9).satisfy(10.0, &mut primary, Some(&mut secondary), 1.0);
        assert!((a.from_primary - 6.0).abs() < 1e-12);
        // headroom is (0.95 - 0.9) * 1000 = 50 native = 0.05 MW
        assert!((s.amount - 900.0).abs() < 1e-9);
        assert!((a.from_secondary - 0.05).abs() < 1e-12);
        assert!((a.fulfillment - 0.605).abs() < 1e-12);
    }

    #[test]
    fn ample_secondary_caps_fulfillment_at_one() {
        let mut p = FixedLedger::new(6.0, 100.0);
        let mut s = FixedLedger::new(1.0e7, 1.0e7);
        let mut primary = ResourceBudget::new(&mut p, 1.0, Accounting::Direct);
        let mut secondary = ResourceBudget::new(&mut s, 1000.0, Accounting::Direct);

        let a = PowerArbiter::new(0.9).satisfy(10.0, &mut primary, Some(&mut secondary), 1.0);
        assert!((a.from_secondary - 4.0).abs() < 1e-9);
        assert_eq!(a.fulfillment, 1.0);
        assert_eq!(s.draws.len(), 1);
        assert!((s.draws[0] - 4000.0).abs() < 1e-6);
    }

    #[test]
    fn secondary_at_floor_is_untouched() {
        let mut p = FixedLedger::new(0.0, 100.0);
        let mut s = FixedLedger::new(900.0, 1000.0);
        let mut primary = ResourceBudget::new(&mut p, 1.0, Accounting::Direct);
        let mut secondary = ResourceBudget::new(&mut s, 1000.0, Accounting::Direct);

        let a = PowerArbiter::new(0.9).satisfy(10.0, &mut primary, Some(&mut secondary), 1.0);
        assert_eq!(a.fulfillment, 0.0);
        assert!(s.draws.is_empty());
    }

    #[test]
    fn zero_requirement_is_fully_met_without_requests() {
        let mut p = FixedLedger::new(10.0, 100.0);
        let mut primary = ResourceBudget::new(&mut p, 1.0, Accounting::Direct);

        let a = PowerArbiter::new(0.9).satisfy(0.0, &mut primary, None, 1.0);
        assert_eq!(a.fulfillment, 1.0);
        assert!(p.draws.is_empty());
    }

    #[test]
    fn backfill_scales_with_tick_length() {
        let mut p = FixedLedger::new(0.0, 100.0);
        let mut s = FixedLedger::new(1.0e6, 1.0e6);
        let mut primary = ResourceBudget::new(&mut p, 1.0, Accounting::Direct);
        let mut secondary = ResourceBudget::new(&mut s, 1000.0, Accounting::Direct);

        let a = PowerArbiter::new(0.5).satisfy(2.0, &mut primary, Some(&mut secondary), 0.02);
        assert!((s.draws[0] - 40.0).abs() < 1e-9);
        assert!((a.fulfillment - 1.0).abs() < 1e-9);
    }
}
