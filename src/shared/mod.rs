pub mod errors;
pub mod retry;
pub mod shutdown;

pub use errors::{DomainError, DomainResult};
pub use retry::{retry_with_backoff, RetryConfig};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};
