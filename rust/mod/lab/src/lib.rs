pub mod api;
pub mod model;
pub mod service;

use std::sync::Arc;

use axum::Router;
use labtrack_core::{Module, ServiceError};
use labtrack_sql::SQLStore;
use labtrack_store::ChangeFeed;

use service::LabService;

/// The lab module: assets, labs, transfers, issues, activity and
/// notifications.
///
/// Owns the [`LabService`] and exposes it over HTTP under `/lab`.
pub struct LabModule {
    service: Arc<LabService>,
}

impl LabModule {
    /// Initialise storage and wrap the service.
    pub fn new(db: Arc<dyn SQLStore>, feed: Arc<ChangeFeed>) -> Result<Self, ServiceError> {
        Ok(Self::from_service(LabService::new(db, feed)?))
    }

    pub fn from_service(service: LabService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    /// The service, for callers outside the HTTP layer (login, bootstrap).
    pub fn service(&self) -> &Arc<LabService> {
        &self.service
    }
}

impl Module for LabModule {
    fn name(&self) -> &str {
        "lab"
    }

    fn routes(&self) -> Router {
        api::router(Arc::clone(&self.service))
    }
}
