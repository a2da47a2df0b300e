//! Interval refresh that pauses while the surface is hidden.

mod poller;
mod visibility;

pub use poller::{Poller, PollerConfig};
pub use visibility::VisibilityMonitor;
