pub mod events;
mod metrics;

pub use metrics::{prometheus_enabled, try_init_prometheus};
