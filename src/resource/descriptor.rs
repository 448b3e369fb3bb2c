//! The CRUD resource descriptor: the uniform shape every resource follows,
//! defined as data. One generic handler + SQL builder is parameterized by a
//! descriptor instead of hand-duplicating near-identical handlers per table.

use crate::error::AppError;
use axum::http::StatusCode;
use serde_json::Value;

/// How path-parameter strings are parsed into key values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyKind {
    BigInt,
    Text,
}

/// One half of a compound key: URL parameter, backing column, display name
/// used in messages ("User ID is required").
#[derive(Clone, Debug)]
pub struct KeyPart {
    pub column: &'static str,
    pub display: &'static str,
}

#[derive(Clone, Debug)]
pub enum KeySpec {
    /// Simple resource keyed by one column (`/{resource}/{id}`).
    Single { column: &'static str, kind: KeyKind },
    /// Join-table resource keyed by two foreign ids
    /// (`/{resource}/{idA}/{idB}`).
    Compound { first: KeyPart, second: KeyPart },
}

impl KeySpec {
    pub fn columns(&self) -> Vec<&'static str> {
        match self {
            KeySpec::Single { column, .. } => vec![column],
            KeySpec::Compound { first, second } => vec![first.column, second.column],
        }
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, KeySpec::Compound { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteMode {
    /// DELETE stamps `deleted_at` instead of removing the row.
    Soft,
    /// DELETE removes the row outright.
    Hard,
}

/// Status code a resource answers when an identifier does not resolve to a
/// live record. Most resources use 404; a few (users, join tables) answer
/// 400, preserved here as per-resource wire behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotFoundStatus {
    NotFound,
    BadRequest,
}

/// A writable column: presence requirement for create, server-side default
/// applied when the body omits it, and the PostgreSQL type (used for DDL and
/// for SQL casts when binding).
#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub required: bool,
    pub default: Option<Value>,
    pub pg_type: &'static str,
}

impl FieldSpec {
    /// Whether the bound parameter gets an explicit SQL cast. Text columns
    /// bind as-is; every other type is cast so NULL and string-encoded binds
    /// coerce server-side.
    pub fn needs_cast(&self) -> bool {
        self.pg_type != "text"
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncludeDirection {
    /// We hold the foreign key (cities -> provinces).
    ToOne,
    /// They hold a foreign key to us (topics -> questions).
    ToMany,
}

/// Post-create side effect: increment a counter column on a related row
/// keyed by a body field (user responses bump the chosen option's
/// `usage_count`). Runs in the same transaction as the insert.
#[derive(Clone, Debug)]
pub struct UsageBump {
    pub body_field: &'static str,
    pub table: &'static str,
    pub column: &'static str,
}

/// Related rows embedded in read/list responses via a scalar subquery.
#[derive(Clone, Debug)]
pub struct IncludeSpec {
    /// Key the embedded value appears under in the response.
    pub name: &'static str,
    pub direction: IncludeDirection,
    pub related_table: &'static str,
    pub our_key: &'static str,
    pub their_key: &'static str,
}

#[derive(Clone, Debug)]
pub struct ResourceDescriptor {
    /// URL path segment ("users", "address-user").
    pub path_segment: &'static str,
    /// Display name used in messages ("User", "Address-User relationship").
    pub display_name: &'static str,
    pub table: &'static str,
    pub key: KeySpec,
    pub delete: DeleteMode,
    /// Extra columns stamped alongside `deleted_at` on soft delete
    /// (users also flip `is_active` to false).
    pub delete_extra_sets: Vec<(&'static str, Value)>,
    /// Whether reads exclude soft-deleted rows. A few resources read
    /// unfiltered; the inconsistency is carried as data.
    pub filter_deleted_reads: bool,
    pub not_found: NotFoundStatus,
    /// Overrides the `"{display_name} not found"` message for the few
    /// resources whose deployed wording does not fit the pattern.
    pub not_found_message: Option<&'static str>,
    /// Status for a successful create (200 for most resources, 201 for the
    /// quiz family).
    pub created_status: StatusCode,
    /// Counter bumped after a successful create, when present.
    pub create_bump: Option<UsageBump>,
    pub fields: Vec<FieldSpec>,
    /// Filters every list applies unless overridden by a query parameter
    /// (users: `is_active = true`).
    pub list_default_filters: Vec<(&'static str, Value)>,
    pub includes: Vec<IncludeSpec>,
}

impl ResourceDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_soft_delete(&self) -> bool {
        self.delete == DeleteMode::Soft
    }

    /// Error for an identifier that resolved to no live record, at the
    /// status this resource historically used.
    pub fn not_found_error(&self) -> AppError {
        let message = match self.not_found_message {
            Some(m) => m.to_string(),
            None => format!("{} not found", self.display_name),
        };
        match self.not_found {
            NotFoundStatus::NotFound => AppError::NotFound(message),
            NotFoundStatus::BadRequest => AppError::BadRequest(message),
        }
    }

    /// Error for a request missing its identifier(s).
    pub fn id_required_error(&self) -> AppError {
        match &self.key {
            KeySpec::Single { .. } => {
                AppError::Validation(format!("{} ID is required", self.display_name))
            }
            KeySpec::Compound { first, second } => AppError::Validation(format!(
                "{} and {} are required",
                first.display, second.display
            )),
        }
    }

    /// Error for an identifier that failed to parse.
    pub fn invalid_id_error(&self, display: &str) -> AppError {
        AppError::Validation(format!("Invalid {}", display))
    }
}
