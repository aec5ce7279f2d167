pub mod monitor;

pub use monitor::{
    BusinessHoursRule, Observation, ReportRow, RowDiagnostics, SiteStatus, SiteTimezone,
};
