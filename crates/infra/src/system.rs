use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Clock and device-zone abstraction; tests substitute static
/// implementations so cache and alarm behavior is reproducible.
pub trait ISys: Send + Sync {
    fn get_timestamp_millis(&self) -> i64 {
        self.get_timestamp().timestamp_millis()
    }

    fn get_timestamp(&self) -> DateTime<Utc>;

    /// The device timezone the instances cache follows in AUTO mode.
    fn device_timezone(&self) -> Tz;
}

pub struct RealSys {}

impl ISys for RealSys {
    fn get_timestamp(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn device_timezone(&self) -> Tz {
        // The host communicates its zone through the TZ environment
        // variable; anything unparseable falls back to UTC
        std::env::var("TZ")
            .ok()
            .and_then(|tz| tz.parse::<Tz>().ok())
            .unwrap_or(chrono_tz::UTC)
    }
}
