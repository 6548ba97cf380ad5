pub mod impact;
pub mod kpi;

pub use impact::{ImpactReport, StageCount, TrendPoint};
pub use kpi::{average, hours_between, percent, DashboardKpis};
