//! Push-based observability (§10.5): gauges/counters only, no inbound HTTP
//! surface, consistent with this engine having no dashboard or API.

pub mod metrics;
pub mod reporter;

pub use metrics::Metrics;
pub use reporter::MetricsReporter;
