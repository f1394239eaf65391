pub mod aggregator;
pub mod cache;
pub mod normalizer;
pub mod orchestrator;
pub mod prober;
pub mod store;

pub use crate::domain::model::{Annotations, Classification, Identifier, OwnerId, ProbeResult};
pub use crate::domain::ports::{Annotator, DeliveryChannel, Fetcher, NoAnnotation, SavedSets, Storage};
pub use crate::utils::error::Result;
