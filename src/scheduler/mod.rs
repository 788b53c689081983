//! Check-in scheduling: the per-user state machine and the polling loop
//! that drives it.

mod state;
mod switch;

pub use state::{
    CheckInPhase, CheckInState, Urgency, FINAL_WARNING_THRESHOLD_HOURS, URGENT_THRESHOLD_HOURS,
};
pub use switch::{SchedulerConfig, SwitchScheduler, TickReport};
