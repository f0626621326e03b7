pub mod cache;
pub(crate) mod checker;

pub use cache::{LagCache, LagMeasurement, LagStore, MemoryStore};
