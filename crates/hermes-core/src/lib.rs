pub mod broadcaster;
pub mod coordinator;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod reporter;
pub mod state;
pub mod testutil;
pub mod traits;

pub use coordinator::{CoordinatorConfig, WorkerCoordinator};
pub use envelope::{BROADCAST, Command, Destination, Envelope};
pub use error::AppError;
pub use identity::{COORDINATOR_ID, WorkerId};
pub use traits::{RequestChannel, ResponseChannel, WorkUnit};
