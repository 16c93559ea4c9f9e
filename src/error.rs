use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("unsupported activation function `{0}` (expected `sigmoid` or `relu`)")]
    UnsupportedActivation(String),

    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A stochastic operand outside `[-1, 1]` (or not finite).
    #[error("value {0} is outside the stochastic range [-1, 1]")]
    OutOfRange(f64),

    #[error("failed to write {}: {source}", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
