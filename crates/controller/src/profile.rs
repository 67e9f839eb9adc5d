//! Per-variant constants for a startup controller.
//!
//! Every generator variant runs the same control algorithm; what differs is
//! the set of numbers below. A profile is picked once at construction time,
//! either from a named [`ReactorVariant`] preset or from a JSON file.

use serde::{Deserialize, Serialize};

use crate::budget::Accounting;
use crate::error::{ConfigError, ConfigResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactorProfile {
    pub display_name: String,

    /// Logical MW to primary native units.
    pub primary_exchange_rate: f64,
    /// Logical MW to secondary native units (kW-denominated pool by default).
    pub secondary_exchange_rate: f64,
    pub primary_accounting: Accounting,
    pub secondary_accounting: Accounting,

    pub can_jumpstart: bool,

    pub startup_power_multiplier: f64,
    pub startup_cost_gravity_multiplier: f64,
    pub startup_cost_gravity_exponent: f64,
    pub startup_maximum_geforce: f64,
    /// Fraction of raw power output that must be available before charging counts.
    pub startup_minimum_charge_percentage: f64,
    pub gee_force_maintenance_power_multiplier: f64,

    /// Secondary pool reserve floor in percent; the pool is never drawn below it.
    pub max_secondary_power_usage: f64,
    pub power_control_affects_maintenance: bool,
    pub maintenance_waste_heat_ratio: f64,

    pub jumpstart_grace_ticks: u32,
    /// Longest tick (seconds) on which a jumpstart may fire. `None` lets it
    /// fire at any tick length.
    pub jumpstart_max_tick_duration: Option<f64>,
    /// Fraction of stored charge lost per idle tick.
    pub decay_per_tick: f64,
}

impl Default for ReactorProfile {
    fn default() -> Self {
        Self {
            display_name: "Inertial Confinement Fusion Reactor".to_string(),
            primary_exchange_rate: 1.0,
            secondary_exchange_rate: 1000.0,
            primary_accounting: Accounting::Managed,
            secondary_accounting: Accounting::Managed,
            can_jumpstart: true,
            startup_power_multiplier: 1.0,
            startup_cost_gravity_multiplier: 0.0,
            startup_cost_gravity_exponent: 1.0,
            startup_maximum_geforce: 10_000.0,
            startup_minimum_charge_percentage: 0.0,
            gee_force_maintenance_power_multiplier: 0.0,
            max_secondary_power_usage: 90.0,
            power_control_affects_maintenance: true,
            maintenance_waste_heat_ratio: 0.0,
            jumpstart_grace_ticks: 50,
            jumpstart_max_tick_duration: None,
            decay_per_tick: 0.01,
        }
    }
}

impl ReactorProfile {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: &str) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let profile: Self = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Reject values that make the control arithmetic meaningless.
    ///
    /// Non-positive exchange rates are accepted: they switch the source off.
    pub fn validate(&self) -> ConfigResult<()> {
        let finite = [
            ("primary_exchange_rate", self.primary_exchange_rate),
            ("secondary_exchange_rate", self.secondary_exchange_rate),
            ("startup_power_multiplier", self.startup_power_multiplier),
            ("startup_cost_gravity_multiplier", self.startup_cost_gravity_multiplier),
            ("startup_cost_gravity_exponent", self.startup_cost_gravity_exponent),
            ("startup_maximum_geforce", self.startup_maximum_geforce),
            ("startup_minimum_charge_percentage", self.startup_minimum_charge_percentage),
            ("gee_force_maintenance_power_multiplier", self.gee_force_maintenance_power_multiplier),
            ("max_secondary_power_usage", self.max_secondary_power_usage),
            ("maintenance_waste_heat_ratio", self.maintenance_waste_heat_ratio),
            ("decay_per_tick", self.decay_per_tick),
        ];
        for (field, value) in finite {
            if !value.is_finite() {
                return Err(invalid(field, format!("{value} is not finite")));
            }
        }

        let non_negative = [
            ("startup_power_multiplier", self.startup_power_multiplier),
            ("startup_minimum_charge_percentage", self.startup_minimum_charge_percentage),
            ("maintenance_waste_heat_ratio", self.maintenance_waste_heat_ratio),
        ];
        for (field, value) in non_negative {
            if value < 0.0 {
                return Err(invalid(field, format!("{value} must be >= 0")));
            }
        }

        if let Some(max) = self.jumpstart_max_tick_duration {
            if !max.is_finite() || max < 0.0 {
                return Err(invalid(
                    "jumpstart_max_tick_duration",
                    format!("{max} must be a finite value >= 0"),
                ));
            }
        }
        if !(0.0..=100.0).contains(&self.max_secondary_power_usage) {
            return Err(invalid(
                "max_secondary_power_usage",
                format!("{} is outside 0..=100", self.max_secondary_power_usage),
            ));
        }
        if !(0.0..=1.0).contains(&self.decay_per_tick) {
            return Err(invalid(
                "decay_per_tick",
                format!("{} is outside 0..=1", self.decay_per_tick),
            ));
        }
        Ok(())
    }

    /// Reserve floor of the secondary pool as a fraction.
    pub fn secondary_reserve_ratio(&self) -> f64 {
        self.max_secondary_power_usage / 100.0
    }

    /// `multiplier * gravity^exponent`, or `None` when gravity does not affect startup.
    pub fn gravity_divider(&self, gravity: f64) -> Option<f64> {
        if self.startup_cost_gravity_multiplier > 0.0 {
            Some(self.startup_cost_gravity_multiplier * gravity.powf(self.startup_cost_gravity_exponent))
        } else {
            None
        }
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::InvalidField { field, reason }
}

/// Named generator presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReactorVariant {
    InertialConfinementReactor,
    ConfinementFusionReactor,
    ConfinementFusionEngine,
    ParticleAccelerator,
    QuantumSingularityReactor,
}

impl ReactorVariant {
    /// Presets share every constant and differ only in name; per-part tuning
    /// comes from a profile file.
    pub fn profile(&self) -> ReactorProfile {
        ReactorProfile {
            display_name: self.display_name().to_string(),
            ..ReactorProfile::default()
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::InertialConfinementReactor => "Inertial Confinement Fusion Reactor",
            Self::ConfinementFusionReactor => "Confinement Fusion Reactor",
            Self::ConfinementFusionEngine => "Confinement Fusion Engine",
            Self::ParticleAccelerator => "Particle Accelerator",
            Self::QuantumSingularityReactor => "Quantum Singularity Reactor",
        }
    }

    pub fn all() -> &'static [ReactorVariant] {
        &[
            Self::InertialConfinementReactor,
            Self::ConfinementFusionReactor,
            Self::ConfinementFusionEngine,
            Self::ParticleAccelerator,
            Self::QuantumSingularityReactor,
        ]
    }
}

impl std::str::FromStr for ReactorVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "inertialconfinementreactor" | "icf" => Ok(Self::InertialConfinementReactor),
            "confinementfusionreactor" => Ok(Self::ConfinementFusionReactor),
            "confinementfusionengine" => Ok(Self::ConfinementFusionEngine),
            "particleaccelerator" => Ok(Self::ParticleAccelerator),
            "quantumsingularityreactor" => Ok(Self::QuantumSingularityReactor),
            _ => Err(ConfigError::UnknownVariant(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let p = ReactorProfile::from_json(r#"{ "startup_power_multiplier": 2.5 }"#).unwrap();
        assert_eq!(p.startup_power_multiplier, 2.5);
        assert_eq!(p.secondary_exchange_rate, 1000.0);
        assert_eq!(p.jumpstart_grace_ticks, 50);
    }

    #[test]
    fn accounting_reads_lowercase() {
        let p = ReactorProfile::from_json(r#"{ "primary_accounting": "direct" }"#).unwrap();
        assert_eq!(p.primary_accounting, Accounting::Direct);
    }

    #[test]
    fn rejects_reserve_out_of_range() {
        let err = ReactorProfile::from_json(r#"{ "max_secondary_power_usage": 120 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidField { field: "max_secondary_power_usage", .. }
        ));
    }

    #[test]
    fn negative_exchange_rate_is_not_an_error() {
        let p = ReactorProfile::from_json(r#"{ "secondary_exchange_rate": -1 }"#).unwrap();
        assert!(p.secondary_exchange_rate < 0.0);
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = ReactorProfile::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn gravity_divider_only_when_configured() {
        let mut p = ReactorProfile::default();
        assert_eq!(p.gravity_divider(9.81), None);

        p.startup_cost_gravity_multiplier = 2.0;
        p.startup_cost_gravity_exponent = 2.0;
        let d = p.gravity_divider(3.0).unwrap();
        assert!((d - 18.0).abs() < 1e-12);
    }

    #[test]
    fn variants_parse_and_validate() {
        for v in ReactorVariant::all() {
            assert!(v.profile().validate().is_ok(), "{v:?}");
        }
        let v: ReactorVariant = "particle-accelerator".parse().unwrap();
        assert_eq!(v, ReactorVariant::ParticleAccelerator);
        assert!("warp-core".parse::<ReactorVariant>().is_err());
    }

    #[test]
    fn variants_differ_only_in_name() {
        let base = ReactorProfile::default();
        for v in ReactorVariant::all() {
            let p = v.profile();
            assert_eq!(p.display_name, v.display_name());
            assert_eq!(
                ReactorProfile {
                    display_name: base.display_name.clone(),
                    ..p
                },
                base
            );
        }
    }

    #[test]
    fn tick_guard_is_opt_in() {
        assert_eq!(ReactorProfile::default().jumpstart_max_tick_duration, None);

        let p = ReactorProfile::from_json(r#"{ "jumpstart_max_tick_duration": 0.1 }"#).unwrap();
        assert_eq!(p.jumpstart_max_tick_duration, Some(0.1));

        let err = ReactorProfile::from_json(r#"{ "jumpstart_max_tick_duration": -1 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidField { field: "jumpstart_max_tick_duration", .. }
        ));
    }
}
