//! Graph entities as they arrive from the event stream.
//!
//! Everything here is plain data plus a few derived properties (captions,
//! classification by labels, identity keys). Mutation lives in `store`.

pub mod access_point;
pub mod change;
pub mod flow;
pub mod labels;
pub mod link;
pub mod service;

pub use access_point::{AccessPoint, AccessPoints};
pub use change::{ChangeEvent, ChangeKind};
pub use flow::{Endpoint, EndpointKey, Flow, FlowKey, L4Protocol, Verdict};
pub use labels::Labeled;
pub use link::{Link, LinkKey};
pub use service::Service;
