//! Startup-and-stability controller.
//!
//! A unit cannot switch on instantaneously. It first stores a threshold of
//! charge, then ignites by spending it on top of whatever its supply delivers
//! in the same tick, and from then on has to keep its power requirement met.
//! [`StartupController::advance`] runs once per simulation tick and decides
//! which of those phases the unit is in.

use log::{debug, info, trace, warn};
use safety::{InterlockConfig, Readings};
use serde::{Deserialize, Serialize};

use crate::arbiter::{met_ratio, PowerArbiter};
use crate::budget::{round_tick, Environment, ResourceBudget, Sources};
use crate::charge::{apply_gravity_divider, ChargeBuffer, ChargeRequest};
use crate::profile::ReactorProfile;
use crate::stability::StabilityTracker;

/// Waste heat per MW of charging power.
const CHARGING_WASTE_HEAT: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Idle,
    ChargingForIgnition,
    Igniting,
    Running,
}

/// Fields that survive a save/reload. Everything else is rebuilt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub accumulated: f64,
    pub enabled: bool,
    pub is_charging: bool,
    pub credit: f64,
    pub allow_reignite: bool,
}

/// What the host asks of the unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Demand {
    /// Rated maintenance requirement at full power (MW).
    pub normalized_requirement: f64,
    /// Host power setting in [0, 1].
    pub power_ratio: f64,
    /// Fraction of the requirement actually requested this tick.
    pub required_ratio: f64,
    /// Raw output of the unit, used for the minimum charging rate (MW).
    pub raw_power_output: f64,
}

impl Default for Demand {
    fn default() -> Self {
        Self {
            normalized_requirement: 0.0,
            power_ratio: 1.0,
            required_ratio: 1.0,
            raw_power_output: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ControllerEvent {
    /// Supply could not reach the minimum charging rate.
    ChargeShortage { minimum_rate: f64 },
    /// Charging paused by the gravity ceiling.
    GravityBlocked { gravity: f64, ceiling: f64 },
    Jumpstarted { spent: f64 },
    Ignited,
    FuelStarved,
    ModeChanged { from: Mode, to: Mode },
}

/// Read-only view for displays and downstream output models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Readout {
    pub plasma_ratio: f64,
    pub enabled: bool,
    pub is_charging: bool,
    pub accumulated_charge: f64,
    pub power_consumed: f64,
    pub power_required: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub mode: Mode,
    pub readout: Readout,
    /// Charge needed to ignite at this tick's conditions.
    pub threshold: f64,
    pub fulfillment: f64,
    /// Heat to be dumped into the host's heat sink (MW).
    pub waste_heat: f64,
    pub events: Vec<ControllerEvent>,
}

#[derive(Debug, Clone)]
pub struct StartupController {
    profile: ReactorProfile,
    interlocks: InterlockConfig,
    arbiter: PowerArbiter,
    charge: ChargeBuffer,
    stability: StabilityTracker,
    enabled: bool,
    is_charging: bool,
    demand: Demand,
    fuel_availability: f64,
    power_consumed: f64,
    power_required: f64,
    threshold: f64,
}

impl StartupController {
    pub fn new(profile: ReactorProfile) -> Self {
        Self::restore(profile, PersistedState::default())
    }

    pub fn restore(profile: ReactorProfile, state: PersistedState) -> Self {
        let interlocks = InterlockConfig {
            max_startup_gravity: profile.startup_maximum_geforce,
            ..Default::default()
        };
        let arbiter = PowerArbiter::new(profile.secondary_reserve_ratio());
        Self {
            interlocks,
            arbiter,
            charge: ChargeBuffer::new(state.accumulated),
            stability: StabilityTracker::new(state.credit, state.allow_reignite),
            enabled: state.enabled,
            is_charging: state.is_charging,
            demand: Demand::default(),
            fuel_availability: 1.0,
            power_consumed: 0.0,
            power_required: 0.0,
            threshold: 0.0,
            profile,
        }
    }

    pub fn snapshot(&self) -> PersistedState {
        PersistedState {
            accumulated: self.charge.accumulated(),
            enabled: self.enabled,
            is_charging: self.is_charging,
            credit: self.stability.credit(),
            allow_reignite: self.stability.allow_reignite(),
        }
    }

    /// Bring the unit up after activation. A unit that was allowed to
    /// re-ignite comes back enabled with a fresh grace window, unless the
    /// host asks for it to start disabled.
    pub fn activate(&mut self, start_disabled: bool) {
        if !self.stability.allow_reignite() {
            return;
        }
        if start_disabled {
            self.stability.revoke_reignite();
            self.enabled = false;
        } else {
            self.stability.engage_grace(self.profile.jumpstart_grace_ticks);
            self.enabled = true;
        }
        info!(
            "{} activated (start_disabled={start_disabled}, enabled={})",
            self.profile.display_name, self.enabled
        );
    }

    /// Begin charging for ignition.
    pub fn start(&mut self) {
        if !self.is_charging {
            info!("{} charging for ignition", self.profile.display_name);
        }
        self.is_charging = true;
    }

    pub fn stop(&mut self) {
        if self.enabled || self.is_charging {
            info!("{} shut down", self.profile.display_name);
        }
        self.enabled = false;
        self.is_charging = false;
        self.power_consumed = 0.0;
        self.stability.shut_down();
    }

    /// Host override of the enabled flag. Turning the unit on this way skips
    /// charging; turning it off leaves charging and stored charge alone.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled != self.enabled {
            debug!("{} enabled set to {enabled}", self.profile.display_name);
        }
        self.enabled = enabled;
    }

    pub fn set_demand(&mut self, demand: Demand) {
        self.demand = demand;
    }

    /// Upstream fuel availability in [0, 1].
    pub fn set_fuel_availability(&mut self, ratio: f64) {
        self.fuel_availability = ratio;
    }

    pub fn notify_fuel_mode_swap(&mut self) {
        self.stability.notify_fuel_mode_swap();
    }

    pub fn profile(&self) -> &ReactorProfile {
        &self.profile
    }

    pub fn plasma_ratio(&self) -> f64 {
        self.stability.plasma_ratio()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_charging(&self) -> bool {
        self.is_charging
    }

    pub fn accumulated_charge(&self) -> f64 {
        self.charge.accumulated()
    }

    pub fn credit(&self) -> f64 {
        self.stability.credit()
    }

    pub fn allow_reignite(&self) -> bool {
        self.stability.allow_reignite()
    }

    pub fn power_consumed(&self) -> f64 {
        self.power_consumed
    }

    pub fn power_required(&self) -> f64 {
        self.power_required
    }

    /// Maintenance power the unit needs right now (MW).
    pub fn power_requirement(&self, gravity: f64) -> f64 {
        let d = &self.demand;
        let mut requirement = if self.profile.power_control_affects_maintenance {
            d.power_ratio * d.normalized_requirement
        } else {
            d.normalized_requirement
        };
        if self.profile.gee_force_maintenance_power_multiplier > 0.0 {
            requirement += (requirement * self.profile.gee_force_maintenance_power_multiplier * gravity).abs();
        }
        requirement.max(0.0)
    }

    /// Charge needed to ignite under `gravity`.
    pub fn startup_threshold(&self, gravity: f64) -> f64 {
        ChargeBuffer::required_threshold(&self.profile, self.power_requirement(gravity), gravity)
    }

    /// Primary rate below which charging is ineffective.
    pub fn minimum_charging_rate(&self, gravity: f64) -> f64 {
        let minimum = self.profile.startup_minimum_charge_percentage * self.demand.raw_power_output;
        apply_gravity_divider(&self.profile, minimum, gravity)
    }

    pub fn mode(&self) -> Mode {
        match (self.enabled, self.is_charging) {
            (true, _) if self.stability.has_credit() => Mode::Running,
            (true, _) => Mode::Igniting,
            (false, true) if self.is_fully_charged() => Mode::Igniting,
            (false, true) => Mode::ChargingForIgnition,
            (false, false) => Mode::Idle,
        }
    }

    fn is_fully_charged(&self) -> bool {
        self.threshold > 0.0 && self.charge.accumulated() >= self.threshold * (1.0 - 1e-9)
    }

    pub fn readout(&self) -> Readout {
        Readout {
            plasma_ratio: self.stability.plasma_ratio(),
            enabled: self.enabled,
            is_charging: self.is_charging,
            accumulated_charge: self.charge.accumulated(),
            power_consumed: self.power_consumed,
            power_required: self.power_required,
        }
    }

    /// Run one simulation tick.
    pub fn advance(&mut self, env: &impl Environment, sources: Sources<'_>) -> TickReport {
        let before = self.mode();
        let mut tick = TickScratch::default();

        let gravity = env.gravity_magnitude();
        let dt = round_tick(env.tick_duration());
        let requirement = self.power_requirement(gravity);
        self.power_required = requirement;
        self.threshold = self.startup_threshold(gravity);

        let interlock = safety::evaluate(
            &self.interlocks,
            Readings {
                fuel_ratio: self.fuel_availability,
                gravity,
            },
        );

        if interlock.fuel_starved {
            if self.enabled {
                warn!(
                    "{} fuel starved ({:.4}), shutting down",
                    self.profile.display_name, self.fuel_availability
                );
                tick.events.push(ControllerEvent::FuelStarved);
            }
            self.enabled = false;
            self.power_consumed = 0.0;
            self.stability.hold(0.0);
            return self.finish(before, tick);
        }

        // nothing needed, nothing drawn
        if requirement <= 0.0 {
            self.power_consumed = 0.0;
            self.stability.hold(1.0);
            return self.finish(before, tick);
        }

        if dt <= 0.0 {
            return self.finish(before, tick);
        }

        if !self.enabled && !self.is_charging {
            self.power_consumed = 0.0;
            self.stability.shut_down();
            self.charge.decay(self.profile.decay_per_tick);
            return self.finish(before, tick);
        }

        let Sources { primary, secondary } = sources;
        let mut primary = ResourceBudget::new(
            primary,
            self.profile.primary_exchange_rate,
            self.profile.primary_accounting,
        );
        let mut secondary = secondary.map(|ledger| {
            ResourceBudget::new(
                ledger,
                self.profile.secondary_exchange_rate,
                self.profile.secondary_accounting,
            )
        });

        if self.is_charging && self.profile.can_jumpstart {
            if interlock.charging_blocked {
                debug!(
                    "{} charging paused: {gravity:.2} g >= {:.2} g",
                    self.profile.display_name, self.profile.startup_maximum_geforce
                );
                tick.events.push(ControllerEvent::GravityBlocked {
                    gravity,
                    ceiling: self.profile.startup_maximum_geforce,
                });
            } else {
                let request = ChargeRequest {
                    threshold: self.threshold,
                    minimum_rate: self.minimum_charging_rate(gravity),
                    dt,
                    allow_secondary: self.profile.startup_minimum_charge_percentage <= 0.0,
                    secondary_reserve_ratio: self.arbiter.secondary_reserve_ratio,
                };
                let outcome = self.charge.fill(request, &mut primary, secondary.as_mut());
                if let Some(minimum_rate) = outcome.shortage {
                    warn!(
                        "{} needs at least {minimum_rate:.0} MW to charge",
                        self.profile.display_name
                    );
                    tick.events.push(ControllerEvent::ChargeShortage { minimum_rate });
                }
                if self.profile.maintenance_waste_heat_ratio > 0.0 {
                    tick.waste_heat += CHARGING_WASTE_HEAT * outcome.primary_rate;
                }
            }
        }

        let requested = requirement * self.demand.required_ratio;
        // secondary backfill only once the unit is up
        let backfill = if self.enabled { secondary.as_mut() } else { None };
        let arbitration = self.arbiter.satisfy(requested, &mut primary, backfill, dt);
        tick.waste_heat += self.profile.maintenance_waste_heat_ratio * arbitration.from_primary;
        tick.fulfillment = arbitration.fulfillment;
        self.power_consumed = requirement * arbitration.fulfillment;
        trace!(
            "arbitration: requested={requested:.4} primary={:.4} secondary={:.4} met={:.4}",
            arbitration.from_primary,
            arbitration.from_secondary,
            arbitration.fulfillment
        );

        self.try_jumpstart(dt, &mut tick);

        let update = self.stability.update(
            met_ratio(self.power_consumed, requirement),
            met_ratio(self.power_consumed, self.threshold),
        );

        if update.full_output {
            if !self.enabled {
                info!("{} ignited", self.profile.display_name);
                tick.events.push(ControllerEvent::Ignited);
            }
            self.enabled = true;
            self.is_charging = false;
            if update.settled {
                self.charge.clear();
            }
        }

        self.finish(before, tick)
    }

    /// Cover the gap between drawn power and the ignition threshold from
    /// stored charge, if the charge is enough to close it this tick.
    fn try_jumpstart(&mut self, dt: f64, tick: &mut TickScratch) {
        let accumulated = self.charge.accumulated();
        let tick_too_long = self
            .profile
            .jumpstart_max_tick_duration
            .is_some_and(|max| dt > max);
        if !self.profile.can_jumpstart
            || tick_too_long
            || accumulated <= 0.0
            || self.power_consumed >= self.threshold
            || accumulated + self.power_consumed < self.threshold
        {
            return;
        }

        let shortage = self.threshold - self.power_consumed;
        let spent = self.charge.spend(shortage);
        self.power_consumed += spent;
        self.stability.engage_grace(self.profile.jumpstart_grace_ticks);
        info!(
            "{} jumpstart: spent {spent:.3} of stored charge, {:.3} left",
            self.profile.display_name,
            self.charge.accumulated()
        );
        tick.events.push(ControllerEvent::Jumpstarted { spent });
    }

    fn finish(&self, before: Mode, mut tick: TickScratch) -> TickReport {
        let mode = self.mode();
        if mode != before {
            debug!("{}: {before:?} -> {mode:?}", self.profile.display_name);
            tick.events.push(ControllerEvent::ModeChanged { from: before, to: mode });
        }
        TickReport {
            mode,
            readout: self.readout(),
            threshold: self.threshold,
            fulfillment: tick.fulfillment,
            waste_heat: tick.waste_heat,
            events: tick.events,
        }
    }
}

#[derive(Default)]
struct TickScratch {
    fulfillment: f64,
    waste_heat: f64,
    events: Vec<ControllerEvent>,
}
