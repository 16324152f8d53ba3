pub mod aggregator;
pub mod api;
pub mod client;
pub mod normalizer;
pub mod reminder;
pub mod sources;

pub use aggregator::{Aggregator, SourceSlot};
pub use normalizer::{normalize, normalize_all, ContestFilter, ContestRecord, ContestStatus};
pub use sources::Platform;
