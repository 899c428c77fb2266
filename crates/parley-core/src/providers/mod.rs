//! Model provider lookup
//!
//! The request pipeline only needs to know which provider backs a model,
//! what the model can do, and what to substitute when it is unavailable.
//! Provider HTTP clients live outside this crate.

mod registry;
mod traits;

pub use registry::StaticProviderRegistry;
pub use traits::{AvailableModel, ModelProviderRegistry};
