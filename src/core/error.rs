use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DistributeError {
    #[error("Missing work")]
    MissingWork,

    #[error("Replica lag of {lag:?} exceeds budget of {max_lag:?}")]
    TooMuchLag { lag: Duration, max_lag: Duration },

    #[error("No replicas available")]
    NoReplicasAvailable,

    #[error("Lag query failed: {0}")]
    LagQuery(String),
}

pub type Result<T> = std::result::Result<T, DistributeError>;
