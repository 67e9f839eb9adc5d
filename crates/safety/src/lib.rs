#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interlock {
    /// Upstream fuel has collapsed below the running floor.
    FuelStarved,
    /// Local gravitational loading is above the startup ceiling.
    GravityCeiling,
    /// A reading was NaN, infinite or outside its valid range.
    ReadingInvalid,
}

#[derive(Clone, Copy, Debug)]
pub struct InterlockConfig {
    /// Fuel availability at or below this ratio forces the unit down.
    pub min_fuel_ratio: f64,
    /// Charging is suspended while gravity is at or above this value.
    pub max_startup_gravity: f64,
    pub valid_gravity_range: (f64, f64),
}

impl Default for InterlockConfig {
    fn default() -> Self {
        Self {
            min_fuel_ratio: 0.01,
            max_startup_gravity: 10_000.0,
            valid_gravity_range: (0.0, 1.0e6),
        }
    }
}

/// Per-tick readings the interlocks look at.
#[derive(Clone, Copy, Debug)]
pub struct Readings {
    pub fuel_ratio: f64,
    pub gravity: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InterlockState {
    /// Unit must report zero output and drop to idle.
    pub fuel_starved: bool,
    /// Charging must pause this tick; running is unaffected.
    pub charging_blocked: bool,
    pub reason: Option<Interlock>,
}

impl InterlockState {
    pub fn is_clear(&self) -> bool {
        self.reason.is_none()
    }
}

fn is_valid(v: f64, range: (f64, f64)) -> bool {
    v.is_finite() && v >= range.0 && v <= range.1
}

/// Evaluate the startup interlocks for one tick.
///
/// Nothing is latched: every tick is judged on its own readings, so a
/// blocked condition clears as soon as the readings recover.
pub fn evaluate(cfg: &InterlockConfig, readings: Readings) -> InterlockState {
    let mut state = InterlockState::default();

    // An unreadable fuel gauge counts as no fuel.
    if !is_valid(readings.fuel_ratio, (0.0, f64::MAX)) {
        state.fuel_starved = true;
        state.reason = Some(Interlock::ReadingInvalid);
        return state;
    }
    if readings.fuel_ratio <= cfg.min_fuel_ratio {
        state.fuel_starved = true;
        state.reason = Some(Interlock::FuelStarved);
        return state;
    }

    if !is_valid(readings.gravity, cfg.valid_gravity_range) {
        state.charging_blocked = true;
        state.reason = Some(Interlock::ReadingInvalid);
    } else if readings.gravity >= cfg.max_startup_gravity {
        state.charging_blocked = true;
        state.reason = Some(Interlock::GravityCeiling);
    }

    state
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readings(fuel_ratio: f64, gravity: f64) -> Readings {
        Readings { fuel_ratio, gravity }
    }

    #[test]
    fn nominal_readings_are_clear() {
        let s = evaluate(&InterlockConfig::default(), readings(1.0, 9.81));
        assert!(s.is_clear());
        assert!(!s.fuel_starved);
        assert!(!s.charging_blocked);
    }

    #[test]
    fn fuel_floor_is_inclusive() {
        let cfg = InterlockConfig::default();
        let s = evaluate(&cfg, readings(0.01, 0.0));
        assert!(s.fuel_starved);
        assert_eq!(s.reason, Some(Interlock::FuelStarved));

        let s = evaluate(&cfg, readings(0.0101, 0.0));
        assert!(!s.fuel_starved);
    }

    #[test]
    fn gravity_ceiling_blocks_charging_only() {
        let cfg = InterlockConfig {
            max_startup_gravity: 5.0,
            ..Default::default()
        };
        let s = evaluate(&cfg, readings(1.0, 6.0));
        assert!(s.charging_blocked);
        assert!(!s.fuel_starved);
        assert_eq!(s.reason, Some(Interlock::GravityCeiling));
    }

    #[test]
    fn nan_readings_are_treated_conservatively() {
        let cfg = InterlockConfig::default();
        let s = evaluate(&cfg, readings(f64::NAN, 1.0));
        assert!(s.fuel_starved);
        assert_eq!(s.reason, Some(Interlock::ReadingInvalid));

        let s = evaluate(&cfg, readings(1.0, f64::INFINITY));
        assert!(s.charging_blocked);
        assert_eq!(s.reason, Some(Interlock::ReadingInvalid));
    }

    #[test]
    fn starvation_takes_priority_over_gravity() {
        let cfg = InterlockConfig {
            max_startup_gravity: 1.0,
            ..Default::default()
        };
        let s = evaluate(&cfg, readings(0.0, 50.0));
        assert!(s.fuel_starved);
        assert!(!s.charging_blocked);
    }
}
