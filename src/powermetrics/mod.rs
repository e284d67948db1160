//! Decoding, validation and transactional storage of powermetrics reports.

pub mod decode;
pub mod model;
pub mod service;
pub mod timestamp;
pub mod validation;

pub use model::{PowerMetrics, Task};
pub use service::{IngestError, PowerMetricsService};
pub use timestamp::Timestamp;
