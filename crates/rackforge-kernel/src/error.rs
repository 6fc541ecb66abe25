use std::time::Duration;

use thiserror::Error;

/// Failures establishing or keeping the kernel worker link.
///
/// Render failures are not errors at this level: they come back as a
/// `RenderOutcome::Failure` inside a normal response.
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("Failed to start kernel worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Kernel worker rejected initialization: {0}")]
    InitRejected(String),

    #[error("Kernel worker not ready after {0:?}")]
    InitTimeout(Duration),

    #[error("Kernel worker channel closed")]
    ChannelClosed,

    #[error("Kernel worker I/O error: {0}")]
    Io(#[from] std::io::Error),
}
