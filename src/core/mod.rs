pub mod error;

pub use error::{DistributeError, Result};
