pub mod capability;
pub mod registry;
pub mod schema;

pub use capability::{validate, CapabilityCall, CapabilityKind, ValidationOutcome};
pub use registry::{CapabilityRegistry, Dispatched};
pub use schema::{capability_descriptors, CapabilityDescriptor};
