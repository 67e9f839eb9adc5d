//! Collaborator interfaces: the resource ledger and the environment.
//!
//! The controller never stores energy itself. All withdrawals go through a
//! [`ResourceBudget`], which wraps a host-owned [`ResourceLedger`] with the
//! exchange rate and accounting mode of one resource kind. Short supply is
//! never an error; it shows up as a smaller grant.

use serde::{Deserialize, Serialize};

/// Decimal places kept on tick durations before they are divided by.
pub const TICK_DECIMALS: i32 = 7;

/// Round a tick duration to [`TICK_DECIMALS`] places.
pub fn round_tick(dt: f64) -> f64 {
    let scale = 10f64.powi(TICK_DECIMALS);
    (dt * scale).round() / scale
}

/// One host-owned resource pool, in its native units.
pub trait ResourceLedger {
    /// Stored amount right now.
    fn amount(&self) -> f64;
    fn capacity(&self) -> f64;

    /// Fill fraction as reported by the host's smoothed (managed) accounting.
    fn managed_ratio(&self) -> f64 {
        self.direct_ratio()
    }

    /// Instantaneous fill fraction of the connected storage.
    fn direct_ratio(&self) -> f64 {
        let capacity = self.capacity();
        if capacity > 0.0 {
            self.amount() / capacity
        } else {
            0.0
        }
    }

    /// Supply the pool can sustain per second.
    fn stable_supply(&self) -> f64;

    /// Withdraw an absolute amount; returns what was actually removed.
    fn draw(&mut self, amount: f64) -> f64;

    /// Withdraw `rate` per second over `dt` seconds through the host's
    /// managed accounting; returns the granted rate per second.
    fn draw_per_second(&mut self, rate: f64, dt: f64) -> f64 {
        if dt <= 0.0 {
            return 0.0;
        }
        self.draw(rate * dt) / dt
    }
}

/// Local conditions the host reports each tick.
pub trait Environment {
    /// Gravitational loading, >= 0.
    fn gravity_magnitude(&self) -> f64;
    /// Seconds represented by this tick, already rounded by the host.
    fn tick_duration(&self) -> f64;
}

/// The pools a controller draws from on one tick.
pub struct Sources<'a> {
    pub primary: &'a mut dyn ResourceLedger,
    pub secondary: Option<&'a mut dyn ResourceLedger>,
}

impl<'a> Sources<'a> {
    pub fn new(primary: &'a mut dyn ResourceLedger) -> Self {
        Self {
            primary,
            secondary: None,
        }
    }

    pub fn with_secondary(mut self, secondary: &'a mut dyn ResourceLedger) -> Self {
        self.secondary = Some(secondary);
        self
    }
}

/// How requests against a pool are settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accounting {
    /// Per-second requests against the host's smoothed running average.
    Managed,
    /// Absolute requests against the instantaneously connected storage.
    Direct,
}

/// A ledger viewed in logical power units (MW).
pub struct ResourceBudget<'a> {
    ledger: &'a mut dyn ResourceLedger,
    exchange_rate: f64,
    accounting: Accounting,
}

impl<'a> ResourceBudget<'a> {
    pub fn new(ledger: &'a mut dyn ResourceLedger, exchange_rate: f64, accounting: Accounting) -> Self {
        Self {
            ledger,
            exchange_rate,
            accounting,
        }
    }

    /// A source with a non-positive exchange rate takes no part in arbitration.
    pub fn is_enabled(&self) -> bool {
        self.exchange_rate > 0.0
    }

    pub fn exchange_rate(&self) -> f64 {
        self.exchange_rate
    }

    /// Withdraw `rate` logical MW for `dt` seconds. Returns the granted rate
    /// in logical MW; never more than requested by the ledger's contract.
    pub fn request(&mut self, rate: f64, dt: f64) -> f64 {
        if !self.is_enabled() || rate <= 0.0 || dt <= 0.0 {
            return 0.0;
        }
        let native = rate * self.exchange_rate;
        let granted = match self.accounting {
            Accounting::Managed => self.ledger.draw_per_second(native, dt),
            Accounting::Direct => self.ledger.draw(native * dt) / dt,
        };
        granted.max(0.0) / self.exchange_rate
    }

    /// Withdraw an absolute native amount; returns logical MW·s received.
    pub fn request_native(&mut self, amount: f64) -> f64 {
        if !self.is_enabled() || amount <= 0.0 {
            return 0.0;
        }
        self.ledger.draw(amount).max(0.0) / self.exchange_rate
    }

    /// Current fill fraction in [0, 1], per this budget's accounting mode.
    pub fn available_ratio(&self) -> f64 {
        let ratio = match self.accounting {
            Accounting::Managed => self.ledger.managed_ratio(),
            Accounting::Direct => self.ledger.direct_ratio(),
        };
        if ratio.is_finite() {
            ratio.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Stored amount and capacity in native units, consistent with
    /// [`available_ratio`](Self::available_ratio).
    ///
    /// The managed view lags the real store, so it is capped by what is
    /// actually there.
    pub fn stored(&self) -> (f64, f64) {
        let capacity = self.ledger.capacity().max(0.0);
        let actual = self.ledger.amount().max(0.0);
        match self.accounting {
            Accounting::Managed => ((capacity * self.available_ratio()).min(actual), capacity),
            Accounting::Direct => (actual, capacity),
        }
    }

    /// Sustainable supply in logical MW.
    pub fn stable_supply(&self) -> f64 {
        if !self.is_enabled() {
            return 0.0;
        }
        self.ledger.stable_supply().max(0.0) / self.exchange_rate
    }
}
