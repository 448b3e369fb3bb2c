//! Reference-directory REST backend: descriptor-driven CRUD over PostgreSQL.
//!
//! Every resource is described by a [`resource::ResourceDescriptor`]; the
//! router, SQL builder, and handlers are generic over those descriptors. The
//! questions resource nested under topics is the one composite exception and
//! has its own store and handlers.

pub mod error;
pub mod handlers;
pub mod migration;
pub mod resource;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;

pub use error::AppError;
pub use migration::bootstrap_schema;
pub use resource::{ResourceDescriptor, ResourceRegistry};
pub use response::IdEncoding;
pub use routes::api_routes;
pub use service::{CrudService, QuestionStore};
pub use state::AppState;
