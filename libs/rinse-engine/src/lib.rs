pub mod batch;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fallback;
pub mod large_fields;
pub mod metrics;
pub mod positional;
pub mod sanitize;
pub mod validate;

pub use batch::CollectionOptions;
pub use config::RinseConfig;
pub use engine::Engine;
pub use error::EngineError;
pub use metrics::{Metrics, MetricsSnapshot};
