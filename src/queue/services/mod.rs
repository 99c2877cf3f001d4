//! Application services orchestrating the analysis task queue.
//!
//! Each service owns an injected clock and reads it once per mutating call.

mod cancellation;
mod error;
mod recovery;
mod submission;
mod worker;

pub use cancellation::CancellationService;
pub use error::{QueueServiceError, QueueServiceResult};
pub use recovery::RecoveryService;
pub use submission::{SubmissionService, SubmitTaskRequest};
pub use worker::WorkerService;
