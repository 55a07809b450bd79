#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Option propagation for kiln
//!
//! Every node of a resolved graph receives its final option set, merged
//! from (lowest to highest precedence):
//!
//! 1. the recipe's own defaults
//! 2. `pattern:option` defaults declared by recipes upstream of the node,
//!    the one nearest the root winning
//! 3. session overrides, wildcard patterns before exact ones
//! 4. overrides on the requirement edge that introduced the node

mod overrides;
mod propagate;

pub use overrides::{OptionOverride, PackagePattern};
pub use propagate::OptionPropagator;

use kiln_errors::Error;
use kiln_resolver::DependencyGraph;

/// Annotate every node of `graph` with its final option set
///
/// Returns the number of session and edge overrides that were applied.
///
/// # Errors
///
/// Returns `OptionError::InvalidOptionValue` when a final value lies outside
/// its option domain and `OptionError::UnknownOption` when an exact override
/// names an option the recipe does not declare.
pub fn propagate(graph: &mut DependencyGraph, overrides: &[OptionOverride]) -> Result<usize, Error> {
    OptionPropagator::new(overrides).propagate(graph)
}
