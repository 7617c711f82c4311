//! Platform-specific adapters.
//!
//! One module per supported ATS plus the AI-assisted fallback. Each adapter
//! implements [`crate::adapters::PlatformAdapter`] and is registered with the
//! [`crate::adapters::AdapterRegistry`] under a fixed priority.

pub mod generic_ai;
pub mod greenhouse;
pub mod lever;
pub mod workable;

pub use generic_ai::GenericAiAdapter;
pub use greenhouse::GreenhouseAdapter;
pub use lever::LeverAdapter;
pub use workable::WorkableAdapter;
