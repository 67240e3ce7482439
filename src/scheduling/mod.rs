mod executor;
mod next_fire;
mod scheduler;

pub use executor::{DeliveryExecutor, DeliveryOutcome};
pub use next_fire::{MIN_DELIVERY_SPACING, ScheduleError, compute_next_fire};
pub use scheduler::DeliveryScheduler;
