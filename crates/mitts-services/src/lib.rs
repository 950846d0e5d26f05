//! mitts-services — the inter-arrival time shaper and the host-side pieces
//! it is driven by: scheduler, config ports, register bank.

pub mod config_port;
pub mod registers;
pub mod relinquish;
pub mod scheduler;
pub mod shaper;
pub mod shared;
pub mod stats;

pub use config_port::{ConfigPort, NoReconfigure, StagedConfig};
pub use registers::{RegisterBank, RegisterConfigPort, RegisterError, RegisterWrite};
pub use relinquish::{RelinquishTimer, TimerState};
pub use scheduler::{EventQueue, Scheduler, ShaperEvent, SimEvent};
pub use shaper::{BinSnapshot, ConfigChange, Grant, Outcome, RelinquishReport, Shaper};
pub use shared::SharedShaper;
pub use stats::{GapHistogram, SourceStats};
