//! Frame production
//!
//! The driver loop and the shared state it publishes for the rest of the
//! process.

pub mod driver;
pub mod fps;
pub mod message;
pub mod state;
pub mod tracks;

pub use driver::{remaining_period, DriverSettings, PipelineDriver, StepOutcome};
pub use fps::FpsMeter;
pub use message::FrameMessage;
pub use state::{PipelineSnapshot, PipelineState};
pub use tracks::{TrackChanges, TrackLedger, TrackSummary};
