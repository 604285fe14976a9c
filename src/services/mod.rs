//! Business logic services

pub mod catalog;
pub mod circulation;
pub mod members;

use std::sync::Arc;

use crate::{config::CirculationConfig, repository::CirculationStore};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub members: members::MembersService,
    pub circulation: circulation::CirculationService,
    pub store: Arc<dyn CirculationStore>,
}

impl Services {
    /// Create all services on top of the given store
    pub fn new(store: Arc<dyn CirculationStore>, circulation_config: CirculationConfig) -> Self {
        Self {
            catalog: catalog::CatalogService::new(store.clone()),
            members: members::MembersService::new(store.clone()),
            circulation: circulation::CirculationService::new(
                store.clone(),
                circulation_config.into(),
            ),
            store,
        }
    }
}
