//! Agent errors.

use logiq::LogiqError;
use logiq_detect::DetectError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Detect(#[from] DetectError),

    #[error(transparent)]
    Miner(#[from] LogiqError),
}
