//! Startup and stability control for generators that must store a charge
//! before they can ignite.

pub mod arbiter;
pub mod budget;
pub mod charge;
pub mod error;
pub mod profile;
pub mod stability;
pub mod startup;

pub use arbiter::{Arbitration, PowerArbiter};
pub use budget::{round_tick, Accounting, Environment, ResourceBudget, ResourceLedger, Sources};
pub use charge::{ChargeBuffer, ChargeOutcome, ChargeRequest};
pub use error::{ConfigError, ConfigResult};
pub use profile::{ReactorProfile, ReactorVariant};
pub use stability::{StabilityTracker, StabilityUpdate};
pub use startup::{ControllerEvent, Demand, Mode, PersistedState, Readout, StartupController, TickReport};
