//! Hysteretic plasma ratio.
//!
//! Every tick at full output earns one unit of credit (up to
//! [`MAX_CREDIT`]). A tick that falls short can spend `10 * (1 - ratio)`
//! credit to keep reporting full output, so a brief dip in supply does not
//! show up in the readiness signal or flip the unit's enabled state.

pub const MAX_CREDIT: f64 = 100.0;
/// Ratio above which output counts as full.
pub const FULL_OUTPUT: f64 = 0.999;
/// Credit past which the ignition charge is considered spent.
pub const SETTLED_CREDIT: f64 = 10.0;
/// Credit cost per unit of shortfall.
pub const SHORTFALL_COST: f64 = 10.0;
/// Slack when comparing credit against a shortfall cost.
const CREDIT_EPSILON: f64 = 1e-9;

/// Round to 4 decimal places, ties to even.
pub fn round_ratio(v: f64) -> f64 {
    (v * 1e4).round_ties_even() / 1e4
}

/// What a tick did to the readiness signal.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StabilityUpdate {
    pub plasma_ratio: f64,
    /// Output reached full strength without spending credit.
    pub full_output: bool,
    /// Credit spent to mask a shortfall.
    pub credit_spent: f64,
    /// Credit has grown past [`SETTLED_CREDIT`].
    pub settled: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StabilityTracker {
    credit: f64,
    plasma_ratio: f64,
    grace_ticks: u32,
    swap_pending: bool,
    allow_reignite: bool,
}

impl StabilityTracker {
    pub fn new(credit: f64, allow_reignite: bool) -> Self {
        Self {
            credit: if credit.is_finite() { credit.clamp(0.0, MAX_CREDIT) } else { 0.0 },
            allow_reignite,
            ..Default::default()
        }
    }

    pub fn credit(&self) -> f64 {
        self.credit
    }

    pub fn plasma_ratio(&self) -> f64 {
        self.plasma_ratio
    }

    pub fn grace_ticks(&self) -> u32 {
        self.grace_ticks
    }

    /// Whether the unit may come back up without recharging.
    pub fn allow_reignite(&self) -> bool {
        self.allow_reignite
    }

    /// Whether stability has been earned at least once since the last cold start.
    pub fn has_credit(&self) -> bool {
        self.credit > 0.0
    }

    /// Report full output for the next `ticks` ticks regardless of supply.
    pub fn engage_grace(&mut self, ticks: u32) {
        self.grace_ticks = ticks;
    }

    /// Report full output once on the next tick, without consuming grace.
    pub fn notify_fuel_mode_swap(&mut self) {
        self.swap_pending = true;
    }

    /// Pin the signal without touching credit (zero-demand or starved ticks).
    pub fn hold(&mut self, plasma_ratio: f64) {
        self.plasma_ratio = plasma_ratio.clamp(0.0, 1.0);
    }

    /// Unit is off: zero output and no free re-ignition.
    pub fn shut_down(&mut self) {
        self.plasma_ratio = 0.0;
        self.allow_reignite = false;
    }

    pub fn revoke_reignite(&mut self) {
        self.allow_reignite = false;
    }

    /// Advance one tick.
    ///
    /// `steady` is the fulfillment ratio against the rated requirement and
    /// `startup` the ratio against the ignition threshold. Until any credit
    /// has been earned the unit is still starting up and is judged by
    /// `startup`.
    pub fn update(&mut self, steady: f64, startup: f64) -> StabilityUpdate {
        let mut plasma = if self.swap_pending {
            self.swap_pending = false;
            1.0
        } else if self.grace_ticks > 0 {
            self.grace_ticks -= 1;
            1.0
        } else {
            let raw = if self.credit > 0.0 { steady } else { startup };
            let rounded = round_ratio(raw);
            self.allow_reignite = rounded >= 1.0;
            rounded
        };

        let mut update = StabilityUpdate::default();
        if plasma > FULL_OUTPUT {
            plasma = 1.0;
            self.credit = (self.credit + 1.0).min(MAX_CREDIT);
            update.full_output = true;
            update.settled = self.credit > SETTLED_CREDIT;
        } else {
            let cost = SHORTFALL_COST * (1.0 - plasma);
            if self.credit + CREDIT_EPSILON >= cost {
                self.credit = (self.credit - cost).max(0.0);
                update.credit_spent = cost;
                plasma = 1.0;
            }
        }

        self.plasma_ratio = plasma.clamp(0.0, 1.0);
        update.plasma_ratio = self.plasma_ratio;
        update
    }
}
