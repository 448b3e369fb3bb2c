//! Shared application state for all routes.

use crate::resource::ResourceRegistry;
use crate::response::IdEncoding;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Static resource catalog; built once at startup.
    pub registry: Arc<ResourceRegistry>,
    pub id_encoding: IdEncoding,
}

impl AppState {
    pub fn new(pool: PgPool, id_encoding: IdEncoding) -> Self {
        AppState {
            pool,
            registry: Arc::new(ResourceRegistry::standard()),
            id_encoding,
        }
    }
}
