pub mod metrics;

pub use metrics::{DashboardMetrics, MetricsError};
