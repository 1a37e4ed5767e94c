pub mod events;
pub mod scheduler;
pub mod tick;

pub use events::EventBus;
pub use scheduler::{Fired, Scheduler, TimerHandle, TimerOwner};
pub use tick::{Simulation, TickConfig, TickLoop};
