use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use controller::{
    Demand, Environment, PersistedState, ReactorProfile, ReactorVariant, ResourceLedger, Sources,
    StartupController,
};
use sim::{PoolParams, PowerPool, SimEnvironment, SupplyFault, SupplyNoise};

#[derive(Clone, Debug, ValueEnum)]
enum Scenario {
    ColdStart,
    GravityBlocked,
    SecondaryBackfill,
    Brownout,
    FuelStarved,
}

#[derive(Parser, Debug)]
#[command(
    name = "plasma-startup-sim",
    version,
    about = "Startup and stability control of a charge-ignited generator"
)]
struct Args {
    #[arg(value_enum, long, default_value = "cold-start")]
    scenario: Scenario,

    /// Named generator preset
    #[arg(long, default_value = "inertial-confinement-reactor")]
    variant: String,

    /// JSON profile file; overrides --variant
    #[arg(long)]
    profile: Option<String>,

    /// Total simulation time in seconds
    #[arg(long, default_value_t = 30.0)]
    seconds: f64,

    /// Fixed time step in milliseconds
    #[arg(long, default_value_t = 20)]
    dt_ms: u64,

    /// Rated maintenance power requirement (MW)
    #[arg(long, default_value_t = 100.0)]
    requirement: f64,

    /// Local gravitational loading (g)
    #[arg(long, default_value_t = 1.0)]
    gravity: f64,

    /// RNG seed for deterministic supply noise
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(serde::Serialize)]
struct TraceRow {
    t_s: f64,
    mode: String,
    plasma_ratio: f64,
    enabled: bool,
    is_charging: bool,
    accumulated_charge: f64,
    threshold: f64,
    power_required: f64,
    power_consumed: f64,
    fulfillment: f64,
    primary_fill: f64,
    secondary_fill: f64,
    waste_heat: f64,
    events: Vec<String>,
}

/// Everything a scenario varies over the run.
struct Rig {
    controller: StartupController,
    primary: PowerPool,
    secondary: PowerPool,
    supply: SupplyNoise,
    env: SimEnvironment,
    /// Nominal primary production (MW).
    nominal: f64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // logs go to stderr so stdout stays pure JSONL
    let env = env_logger::Env::default().default_filter_or(args.log_level.as_str());
    env_logger::Builder::from_env(env).init();

    let profile = load_profile(&args)?;
    log::info!("profile: {}", profile.display_name);

    let dt_s = (args.dt_ms as f64) / 1000.0;
    let steps = (args.seconds / dt_s).ceil() as u64;

    let mut rig = build_rig(&args, profile, dt_s);
    for k in 0..steps {
        let t_s = (k as f64) * dt_s;

        // Scenario dynamics tweaks during run
        apply_dynamics(&args, &mut rig, t_s);

        let production = rig.supply.sample(rig.nominal, dt_s);
        rig.primary.step(production, dt_s);
        rig.secondary.step(0.0, dt_s);

        let report = rig.controller.advance(
            &rig.env,
            Sources::new(&mut rig.primary).with_secondary(&mut rig.secondary),
        );

        let row = TraceRow {
            t_s,
            mode: format!("{:?}", report.mode),
            plasma_ratio: report.readout.plasma_ratio,
            enabled: report.readout.enabled,
            is_charging: report.readout.is_charging,
            accumulated_charge: report.readout.accumulated_charge,
            threshold: report.threshold,
            power_required: report.readout.power_required,
            power_consumed: report.readout.power_consumed,
            fulfillment: report.fulfillment,
            primary_fill: rig.primary.direct_ratio(),
            secondary_fill: rig.secondary.direct_ratio(),
            waste_heat: report.waste_heat,
            events: report.events.iter().map(|e| format!("{e:?}")).collect(),
        };
        println!("{}", serde_json::to_string(&row)?);
    }

    log::info!(
        "final state: {}",
        serde_json::to_string(&rig.controller.snapshot())?
    );
    Ok(())
}

fn load_profile(args: &Args) -> Result<ReactorProfile> {
    if let Some(path) = &args.profile {
        return ReactorProfile::from_file(path).with_context(|| format!("loading profile {path}"));
    }
    let variant: ReactorVariant = args.variant.parse()?;
    Ok(variant.profile())
}

fn build_rig(args: &Args, profile: ReactorProfile, dt_s: f64) -> Rig {
    let demand = Demand {
        normalized_requirement: args.requirement,
        ..Default::default()
    };
    let running = PersistedState {
        enabled: true,
        credit: 100.0,
        allow_reignite: true,
        ..Default::default()
    };
    let primary_params = PoolParams {
        capacity: args.requirement * 2.0,
        production: args.requirement * 1.2,
        smoothing_s: 1.0,
    };
    // kW-denominated bank holding ten seconds of full requirement
    let secondary_capacity = args.requirement * profile.secondary_exchange_rate.max(1.0) * 10.0;

    let mut supply = SupplyNoise::new(args.seed);
    let mut gravity = args.gravity;
    let (state, nominal, primary_fill, secondary_fill) = match args.scenario {
        Scenario::ColdStart => (PersistedState::default(), args.requirement * 1.2, 0.5, 0.5),
        Scenario::GravityBlocked => {
            gravity = profile.startup_maximum_geforce + 1.0;
            (PersistedState::default(), args.requirement * 1.2, 0.5, 0.5)
        }
        Scenario::SecondaryBackfill => (running, args.requirement * 0.6, 0.0, 0.95),
        Scenario::Brownout => {
            supply.fault = SupplyFault::Brownout {
                factor: 0.9,
                from_step: (args.seconds * 0.4 / dt_s) as u64,
            };
            (running, args.requirement * 1.02, 0.2, 0.0)
        }
        Scenario::FuelStarved => (running, args.requirement * 1.2, 0.5, 0.5),
    };

    let mut controller = StartupController::restore(profile, state);
    controller.set_demand(demand);
    controller.activate(false);
    if matches!(args.scenario, Scenario::ColdStart | Scenario::GravityBlocked) {
        controller.start();
    }

    Rig {
        controller,
        primary: PowerPool::new(primary_params, primary_fill),
        secondary: PowerPool::storage(secondary_capacity, secondary_fill),
        supply,
        env: SimEnvironment::new(gravity, dt_s),
        nominal,
    }
}

fn apply_dynamics(args: &Args, rig: &mut Rig, t_s: f64) {
    match args.scenario {
        Scenario::GravityBlocked if t_s >= args.seconds * 0.5 => {
            // leave the gravity well
            rig.env.gravity = args.gravity;
        }
        Scenario::FuelStarved if t_s >= args.seconds * 0.3 => {
            rig.controller.set_fuel_availability(0.0);
        }
        _ => {}
    }
    log::trace!("t={t_s:.3}s gravity={:.2}g", rig.env.gravity_magnitude());
}
