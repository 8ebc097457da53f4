//! Frame store: registries, frames, and the engine that keeps the global and
//! current frames in step.

pub mod bus;
pub mod engine;
pub mod flows;
pub mod frame;
pub mod layout;
pub mod registry;
pub mod snapshot;

pub use bus::{Notification, NotificationBus, NotificationReceiver};
pub use engine::{FlushOptions, FrameEngine};
pub use flows::FlowRegistry;
pub use frame::Frame;
pub use layout::{Layout, ResetCounter};
pub use registry::{Entity, Registry};
pub use snapshot::{FrameSnapshot, StoreSnapshot, TotalsView};
