//! Core type definitions using newtype patterns for type safety.
//!
//! These types prevent common logic errors by making invalid states unrepresentable
//! at compile time.

mod port;
mod record;
mod target;

pub use port::{Port, PortError, PortSpec};
pub use record::{HostRecord, MacAddr, PortRecord, PortState, ScanId};
pub use target::{TargetError, TargetSpec};
