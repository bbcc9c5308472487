//! Driver scheduler & group runtime: per-group timers on top of
//! `neu-reactor`, the driver plugin contract, the subscriber fan-out, and
//! the in-memory node/group registry that anchors group configuration.

pub mod driver;
pub mod fanout;
pub mod registry;
pub mod scheduler;

pub use driver::{DriverPlugin, GroupTickContext, MetricUpdate, WriteResponse};
pub use fanout::{Subscriber, SubscriberRegistry};
pub use registry::{GroupConfig, NodeRegistry};
pub use scheduler::GroupScheduler;
