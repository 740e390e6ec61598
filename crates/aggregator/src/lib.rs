//! In-process notification aggregation.
//!
//! Providers are registered with an [`AggregationService`]; a per-provider
//! timer fetches from them in the background, results are deduplicated by
//! notification id in the [`NotificationStore`], and consumers read and mark
//! notifications through the service.

pub mod factory;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod store;

pub use factory::ProviderFactory;
pub use registry::{ProviderEntry, ProviderRegistry, ProviderStatus};
pub use scheduler::{FetchSummary, PollOutcome, PollScheduler};
pub use service::{AggregationService, ServiceState};
pub use store::{ListOrder, NotificationStore, StoreEvent};
