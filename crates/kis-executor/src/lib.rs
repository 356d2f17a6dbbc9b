//! Order execution coordination.
//!
//! Consumes the intake queue one request at a time, places orders over
//! REST, tracks accepted orders in the persisted watch registry,
//! aggregates fills from the WS client, and hands first fills to the
//! risk engine.

pub mod coordinator;
pub mod error;
pub mod events;
pub mod intake;
pub mod registry;

pub use coordinator::{Coordinator, PlacementOutcome};
pub use error::{ExecutorError, ExecutorResult};
pub use events::ExecutionSink;
pub use intake::{intake_channel, IntakeItem, OrderIntake};
pub use registry::{FillProgress, WatchRegistry, WatchedOrder};
