pub mod alert;
pub mod channel;
pub mod event;
pub mod message;
pub mod process;

pub use alert::{DelayAlert, DELAYED_TAG};
pub use channel::{ChannelState, ChannelStatus};
pub use event::{EventKind, LifecycleEvent, UnknownReason};
pub use message::RawMessage;
pub use process::{ProcessKey, RunningProcess};
