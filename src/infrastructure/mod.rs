//! Concrete adapters behind the `domain::ports` traits (§6, §10.4, §10.7).

pub mod alert_source;
pub mod brokerage;
pub mod observability;
pub mod persistence;
