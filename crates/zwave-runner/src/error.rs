//! Runner errors.

use thiserror::Error;
use zwave_controller::ControllerError;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Controller(#[from] ControllerError),

    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

pub type RunnerResult<T> = Result<T, RunnerError>;
