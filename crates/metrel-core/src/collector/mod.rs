//! Process and system metrics collection from the Linux `/proc` filesystem.
//!
//! The `FileSystem` trait decouples the sampler from the real filesystem so
//! tests (and non-Linux development) can run against `MockFs` fixtures.

#[allow(clippy::module_inception)]
mod collector;
pub mod mock;
mod traits;

pub use collector::Collector;
pub use mock::MockFs;
pub use traits::{FileSystem, RealFs};
