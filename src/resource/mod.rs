pub mod descriptor;
pub mod registry;

pub use descriptor::{
    DeleteMode, FieldSpec, IncludeDirection, IncludeSpec, KeyKind, KeyPart, KeySpec,
    NotFoundStatus, ResourceDescriptor, UsageBump,
};
pub use registry::ResourceRegistry;
