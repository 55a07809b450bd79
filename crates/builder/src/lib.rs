#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Lifecycle driver for kiln
//!
//! Runs `generate → configure → build → package → install` for every node
//! of a resolved graph, dependencies first, reusing artifacts whose identity
//! is already cached. Nodes run concurrently up to a configured number of
//! permits; a failing node only takes down the nodes that depend on it.

mod cmake;
mod driver;
mod report;
mod state;
mod tool;

pub use cmake::{CMakeBuildTool, CMakeFactory};
pub use driver::{DriverOptions, LifecycleDriver};
pub use report::{NodeReport, SessionReport};
pub use state::{Failure, NodeState};
pub use tool::{BuildContext, BuildTool, BuildToolFactory};

pub use tokio_util::sync::CancellationToken;
