use controller::{round_tick, Environment, ResourceLedger};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

#[derive(Clone, Copy, Debug)]
pub struct PoolParams {
    /// Storage capacity in native units.
    pub capacity: f64,
    /// Nominal production per second in native units.
    pub production: f64,
    /// Time constant (s) of the smoothed fill ratio used by managed accounting.
    pub smoothing_s: f64,
}

impl Default for PoolParams {
    fn default() -> Self {
        Self {
            capacity: 1000.0,
            production: 100.0,
            smoothing_s: 1.0,
        }
    }
}

/// In-memory stand-in for one host resource pool.
#[derive(Clone, Debug)]
pub struct PowerPool {
    pub params: PoolParams,
    pub amount: f64,
    smoothed_ratio: f64,
    /// Production actually delivered on the last step.
    last_production: f64,
}

impl PowerPool {
    pub fn new(params: PoolParams, fill_ratio: f64) -> Self {
        let ratio = fill_ratio.clamp(0.0, 1.0);
        Self {
            amount: params.capacity * ratio,
            smoothed_ratio: ratio,
            last_production: params.production,
            params,
        }
    }

    /// A pool with no production, e.g. a battery bank.
    pub fn storage(capacity: f64, fill_ratio: f64) -> Self {
        Self::new(
            PoolParams {
                capacity,
                production: 0.0,
                ..Default::default()
            },
            fill_ratio,
        )
    }

    /// Add `production` per second over `dt` and update the smoothed ratio.
    ///
    /// Exponential moving average: ratio += (instant - ratio) * dt / (tau + dt)
    pub fn step(&mut self, production: f64, dt_s: f64) {
        self.last_production = production.max(0.0);
        self.amount = (self.amount + self.last_production * dt_s).clamp(0.0, self.params.capacity);

        let alpha = if self.params.smoothing_s > 0.0 {
            dt_s / (self.params.smoothing_s + dt_s)
        } else {
            1.0
        };
        let instant = self.direct_ratio();
        self.smoothed_ratio += (instant - self.smoothed_ratio) * alpha;
    }
}

impl ResourceLedger for PowerPool {
    fn amount(&self) -> f64 {
        self.amount
    }

    fn capacity(&self) -> f64 {
        self.params.capacity
    }

    fn managed_ratio(&self) -> f64 {
        self.smoothed_ratio
    }

    fn stable_supply(&self) -> f64 {
        self.last_production
    }

    fn draw(&mut self, amount: f64) -> f64 {
        let granted = amount.clamp(0.0, self.amount);
        self.amount -= granted;
        granted
    }
}

/// Gravity and tick length for the current step.
#[derive(Clone, Copy, Debug)]
pub struct SimEnvironment {
    pub gravity: f64,
    tick_s: f64,
}

impl SimEnvironment {
    pub fn new(gravity: f64, tick_s: f64) -> Self {
        Self {
            gravity,
            tick_s: round_tick(tick_s),
        }
    }

    pub fn set_tick(&mut self, tick_s: f64) {
        self.tick_s = round_tick(tick_s);
    }
}

impl Environment for SimEnvironment {
    fn gravity_magnitude(&self) -> f64 {
        self.gravity
    }

    fn tick_duration(&self) -> f64 {
        self.tick_s
    }
}

#[derive(Clone, Copy, Debug)]
pub enum SupplyFault {
    None,
    /// Output stuck at a fixed rate.
    Stuck { rate: f64 },
    /// Output scaled by `factor` from `from_step` on.
    Brownout { factor: f64, from_step: u64 },
    Drift { per_s: f64 },
    /// Output drops to zero every `n`th step.
    DropoutEvery { n: u64 },
}

/// Fluctuating upstream generator feeding a pool.
#[derive(Clone, Debug)]
pub struct SupplyNoise {
    /// Standard deviation as a fraction of nominal output.
    pub noise_frac: f64,
    pub fault: SupplyFault,
    rng: StdRng,
    step_count: u64,
}

impl SupplyNoise {
    pub fn new(seed: u64) -> Self {
        Self {
            noise_frac: 0.02,
            fault: SupplyFault::None,
            rng: StdRng::seed_from_u64(seed),
            step_count: 0,
        }
    }

    /// Production rate for this step, never negative.
    pub fn sample(&mut self, nominal: f64, dt_s: f64) -> f64 {
        self.step_count += 1;

        let mut v = match self.fault {
            SupplyFault::None => nominal,
            SupplyFault::Stuck { rate } => return rate.max(0.0),
            SupplyFault::Brownout { factor, from_step } => {
                if self.step_count >= from_step {
                    nominal * factor
                } else {
                    nominal
                }
            }
            SupplyFault::Drift { per_s } => nominal + per_s * (self.step_count as f64) * dt_s,
            SupplyFault::DropoutEvery { n } => {
                if n > 0 && (self.step_count % n) == 0 {
                    return 0.0;
                }
                nominal
            }
        };

        let std = self.noise_frac * v.abs();
        if std > 0.0 {
            if let Ok(normal) = Normal::new(0.0, std) {
                v += normal.sample(&mut self.rng);
            }
        }

        v.max(0.0)
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }
}
