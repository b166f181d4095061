pub mod aggregator;
pub mod correlator;
pub mod delay_detector;
pub mod engine;
pub mod parser;
pub mod publisher;
pub mod relatedness;
pub mod scheduler;
pub mod source;
pub mod timeout_schedule;

pub use engine::{now_millis, JobEngine};
pub use publisher::BroadcastPublisher;
pub use scheduler::{EngineRuntime, RuntimeIntervals};
pub use source::{FileMessageSource, MessageSource};
