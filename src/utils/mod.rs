pub mod logging;

use chrono::{DateTime, Local, Utc};

/// Timestamp used in archived file names, e.g. `20250131_142501`.
pub fn file_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y%m%d_%H%M%S").to_string()
}
