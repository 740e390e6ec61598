use std::sync::Arc;

use herald_common::error::AppError;
use herald_common::sources::SourceDescriptor;
use herald_providers::NotificationProvider;

/// Builds providers from persisted source descriptors.
///
/// The aggregator does not know how any source kind fetches; whoever loads
/// plugins supplies a factory that does.
pub trait ProviderFactory: Send + Sync {
    /// Build the provider described by `descriptor`.
    ///
    /// Return `AppError::Config` for descriptors this factory cannot handle.
    fn build(&self, descriptor: &SourceDescriptor) -> Result<Arc<dyn NotificationProvider>, AppError>;
}

impl<F> ProviderFactory for F
where
    F: Fn(&SourceDescriptor) -> Result<Arc<dyn NotificationProvider>, AppError> + Send + Sync,
{
    fn build(&self, descriptor: &SourceDescriptor) -> Result<Arc<dyn NotificationProvider>, AppError> {
        self(descriptor)
    }
}
