//! Model routing
//!
//! - `ModelRouter`: ordered typed rules mapping a call to a concrete model,
//!   plus the unconditional auto guard and fallback-on-unavailable
//! - `select_consensus_models`: auto-selection for consensus calls

mod consensus;
mod error;
mod router;
mod rules;

pub use consensus::{select_consensus_models, ConsensusSelection};
pub use error::{RoutingError, RoutingResult};
pub use router::{ModelRouter, ResolvedModel, RouteDecision};
pub use rules::{RouteRequest, RoutingRule};
