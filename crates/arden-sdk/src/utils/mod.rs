pub mod time;

pub use time::{now_millis, now_rfc3339, parse_rfc3339_millis, system_time_millis};
