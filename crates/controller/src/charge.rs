use crate::budget::ResourceBudget;
use crate::profile::ReactorProfile;

/// Smallest gravity divider applied to the startup threshold.
pub const GRAVITY_DIVIDER_FLOOR: f64 = 1e-6;

/// Inputs for one charging pass.
#[derive(Clone, Copy, Debug)]
pub struct ChargeRequest {
    pub threshold: f64,
    /// Granted primary rate below which nothing is stored (MW).
    pub minimum_rate: f64,
    pub dt: f64,
    /// Whether the secondary pool may top up the remainder.
    pub allow_secondary: bool,
    /// Fill ratio the secondary top-up never draws below.
    pub secondary_reserve_ratio: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChargeOutcome {
    /// Rate granted by the primary source, whether or not it was stored.
    pub primary_rate: f64,
    pub added: f64,
    /// Set to the minimum charging rate when supply fell short of it.
    pub shortage: Option<f64>,
}

/// Stored energy accumulated toward ignition.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChargeBuffer {
    accumulated: f64,
}

impl ChargeBuffer {
    pub fn new(accumulated: f64) -> Self {
        Self {
            accumulated: sanitize(accumulated),
        }
    }

    pub fn accumulated(&self) -> f64 {
        self.accumulated
    }

    /// Energy needed to ignite.
    ///
    /// Scales the rated requirement by the startup multiplier and, when a
    /// gravity cost is configured, divides by `multiplier * gravity^exponent`.
    /// A non-positive divider leaves the threshold undivided.
    pub fn required_threshold(profile: &ReactorProfile, rated_requirement: f64, gravity: f64) -> f64 {
        let startup = profile.startup_power_multiplier * rated_requirement;
        apply_gravity_divider(profile, startup, gravity)
    }

    pub fn charge(&mut self, amount: f64) {
        if amount > 0.0 {
            self.accumulated += amount;
        }
    }

    /// Bleed off `fraction` of the stored charge.
    pub fn decay(&mut self, fraction: f64) {
        if self.accumulated > 0.0 {
            self.accumulated -= fraction * self.accumulated;
        }
    }

    /// Take up to `amount` out of the buffer; returns what was taken.
    pub fn spend(&mut self, amount: f64) -> f64 {
        let taken = amount.clamp(0.0, self.accumulated);
        self.accumulated -= taken;
        taken
    }

    pub fn clear(&mut self) {
        self.accumulated = 0.0;
    }

    /// Fill toward `req.threshold` from the primary source, then top up from
    /// the secondary one.
    ///
    /// The primary draw is a per-second rate capped by what the source can
    /// sustain at its current fill level, and is stored only if it reaches
    /// the minimum charging rate. The secondary top-up is an absolute
    /// transfer of whatever is still missing, limited to the pool's headroom
    /// above its reserve floor.
    pub fn fill(
        &mut self,
        req: ChargeRequest,
        primary: &mut ResourceBudget<'_>,
        secondary: Option<&mut ResourceBudget<'_>>,
    ) -> ChargeOutcome {
        let mut outcome = ChargeOutcome::default();

        let needed = (req.threshold - self.accumulated).max(0.0);
        if needed <= 0.0 {
            return outcome;
        }

        let stable = primary.stable_supply();
        if stable < req.minimum_rate {
            outcome.shortage = Some(req.minimum_rate);
        } else {
            let request = needed.min(stable * primary.available_ratio());
            let rate = primary.request(request, req.dt);
            outcome.primary_rate = rate;
            if rate >= req.minimum_rate {
                let energy = rate * req.dt;
                self.charge(energy);
                outcome.added += energy;
            } else {
                outcome.shortage = Some(req.minimum_rate);
            }
        }

        let needed = req.threshold - self.accumulated;
        if let Some(secondary) = secondary {
            if req.allow_secondary && needed > 0.0 && secondary.is_enabled() {
                let (amount, capacity) = secondary.stored();
                let headroom = (amount - req.secondary_reserve_ratio * capacity).max(0.0);
                let received = secondary.request_native(headroom.min(needed * secondary.exchange_rate()));
                self.charge(received);
                outcome.added += received;
            }
        }

        outcome
    }
}

/// Divide `power` by the profile's gravity divider when one applies.
pub(crate) fn apply_gravity_divider(profile: &ReactorProfile, power: f64, gravity: f64) -> f64 {
    match profile.gravity_divider(gravity) {
        Some(divider) if divider > 0.0 => power / divider.max(GRAVITY_DIVIDER_FLOOR),
        _ => power,
    }
}

fn sanitize(v: f64) -> f64 {
    if v.is_finite() {
        v.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::testing::FixedLedger;
    use crate::budget::Accounting;

    fn request(threshold: f64) -> ChargeRequest {
        ChargeRequest {
            threshold,
            minimum_rate: 0.0,
            dt: 1.0,
            allow_secondary: true,
            secondary_reserve_ratio: 0.9,
        }
    }

    #[test]
    fn threshold_scales_with_multiplier() {
        let profile = ReactorProfile {
            startup_power_multiplier: 2.0,
            ..Default::default()
        };
        assert_eq!(ChargeBuffer::required_threshold(&profile, 50.0, 9.81), 100.0);
    }

    #[test]
    fn gravity_divider_applies_only_when_positive() {
        let mut profile = ReactorProfile {
            startup_cost_gravity_multiplier: 0.5,
            startup_cost_gravity_exponent: 1.0,
            ..Default::default()
        };
        // 0.5 * 4.0 = 2.0
        assert!((ChargeBuffer::required_threshold(&profile, 100.0, 4.0) - 50.0).abs() < 1e-12);
        // zero gravity gives a zero divider, which is skipped
        assert_eq!(ChargeBuffer::required_threshold(&profile, 100.0, 0.0), 100.0);

        profile.startup_cost_gravity_multiplier = 0.0;
        assert_eq!(ChargeBuffer::required_threshold(&profile, 100.0, 4.0), 100.0);
    }

    #[test]
    fn decay_is_one_percent_per_call() {
        let mut buf = ChargeBuffer::new(100.0);
        buf.decay(0.01);
        assert!((buf.accumulated() - 99.0).abs() < 1e-12);
        buf.decay(0.01);
        assert!((buf.accumulated() - 98.01).abs() < 1e-12);
    }

    #[test]
    fn spend_never_goes_negative() {
        let mut buf = ChargeBuffer::new(5.0);
        assert_eq!(buf.spend(8.0), 5.0);
        assert_eq!(buf.accumulated(), 0.0);
    }

    #[test]
    fn new_rejects_garbage() {
        assert_eq!(ChargeBuffer::new(-3.0).accumulated(), 0.0);
        assert_eq!(ChargeBuffer::new(f64::NAN).accumulated(), 0.0);
    }

    #[test]
    fn fill_is_capped_by_stable_supply_and_fill_level() {
        let mut ledger = FixedLedger::new(50.0, 100.0).with_stable(40.0);
        let mut primary = ResourceBudget::new(&mut ledger, 1.0, Accounting::Direct);
        let mut buf = ChargeBuffer::default();

        let out = buf.fill(request(100.0), &mut primary, None);
        // 40 MW stable at 50% fill allows 20 MW
        assert!((out.primary_rate - 20.0).abs() < 1e-12);
        assert!((buf.accumulated() - 20.0).abs() < 1e-12);
        assert_eq!(out.shortage, None);
    }

    #[test]
    fn fill_stops_at_threshold() {
        let mut ledger = FixedLedger::new(1000.0, 1000.0).with_stable(1000.0);
        let mut primary = ResourceBudget::new(&mut ledger, 1.0, Accounting::Direct);
        let mut buf = ChargeBuffer::new(90.0);

        buf.fill(request(100.0), &mut primary, None);
        assert!((buf.accumulated() - 100.0).abs() < 1e-12);

        let out = buf.fill(request(100.0), &mut primary, None);
        assert_eq!(out, ChargeOutcome::default());
    }

    #[test]
    fn below_minimum_rate_stores_nothing() {
        let mut ledger = FixedLedger::new(100.0, 100.0).with_stable(5.0);
        let mut primary = ResourceBudget::new(&mut ledger, 1.0, Accounting::Direct);
        let mut buf = ChargeBuffer::default();

        let req = ChargeRequest {
            minimum_rate: 10.0,
            ..request(100.0)
        };
        let out = buf.fill(req, &mut primary, None);
        assert_eq!(out.shortage, Some(10.0));
        assert_eq!(buf.accumulated(), 0.0);
    }

    #[test]
    fn secondary_tops_up_remaining_need() {
        let mut p_ledger = FixedLedger::new(30.0, 100.0).with_stable(100.0);
        let mut s_ledger = FixedLedger::new(1_000_000.0, 1_000_000.0);
        let mut primary = ResourceBudget::new(&mut p_ledger, 1.0, Accounting::Direct);
        let mut secondary = ResourceBudget::new(&mut s_ledger, 1000.0, Accounting::Direct);
        let mut buf = ChargeBuffer::default();

        buf.fill(request(100.0), &mut primary, Some(&mut secondary));
        // 30 from primary (100 * 0.3), 70 from secondary
        assert!((buf.accumulated() - 100.0).abs() < 1e-9);
        assert_eq!(s_ledger.draws, vec![70_000.0]);
    }

    #[test]
    fn secondary_top_up_stops_at_reserve_floor() {
        let mut p_ledger = FixedLedger::new(0.0, 100.0).with_stable(100.0);
        let mut s_ledger = FixedLedger::new(95_000.0, 100_000.0);
        let mut primary = ResourceBudget::new(&mut p_ledger, 1.0, Accounting::Direct);
        let mut secondary = ResourceBudget::new(&mut s_ledger, 1000.0, Accounting::Direct);
        let mut buf = ChargeBuffer::default();

        buf.fill(request(100.0), &mut primary, Some(&mut secondary));
        // only the 5000 units above the 90% floor are available
        assert!((buf.accumulated() - 5.0).abs() < 1e-9);
        assert!((s_ledger.amount - 90_000.0).abs() < 1e-6);
    }

    #[test]
    fn secondary_skipped_when_not_allowed() {
        let mut p_ledger = FixedLedger::new(0.0, 100.0).with_stable(100.0);
        let mut s_ledger = FixedLedger::new(1000.0, 1000.0);
        let mut primary = ResourceBudget::new(&mut p_ledger, 1.0, Accounting::Direct);
        let mut secondary = ResourceBudget::new(&mut s_ledger, 1000.0, Accounting::Direct);
        let mut buf = ChargeBuffer::default();

        let req = ChargeRequest {
            allow_secondary: false,
            ..request(100.0)
        };
        buf.fill(req, &mut primary, Some(&mut secondary));
        assert!(s_ledger.draws.is_empty());
    }
}
