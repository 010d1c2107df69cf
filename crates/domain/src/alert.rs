use std::convert::TryFrom;

use chrono::{DateTime, Utc};

use crate::id::ID;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    #[default]
    Scheduled,
    Fired,
    Dismissed,
}

impl From<AlertState> for String {
    fn from(e: AlertState) -> Self {
        match e {
            AlertState::Scheduled => "scheduled".into(),
            AlertState::Fired => "fired".into(),
            AlertState::Dismissed => "dismissed".into(),
        }
    }
}

impl TryFrom<String> for AlertState {
    type Error = anyhow::Error;
    fn try_from(e: String) -> anyhow::Result<AlertState> {
        Ok(match &e[..] {
            "scheduled" => AlertState::Scheduled,
            "fired" => AlertState::Fired,
            "dismissed" => AlertState::Dismissed,
            _ => Err(anyhow::anyhow!("Invalid alert state"))?,
        })
    }
}

/// A persisted record of an alarm handed to the host, so that scheduled
/// alarms survive process loss. Unique by `(alarm_time, begin, event_id)`.
#[derive(Debug, Clone)]
pub struct CalendarAlert {
    pub id: ID,
    pub event_id: ID,
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub alarm_time: DateTime<Utc>,
    pub minutes: i32,
    pub state: AlertState,
    pub creation_time: DateTime<Utc>,
    pub received_time: Option<DateTime<Utc>>,
    pub notify_time: Option<DateTime<Utc>>,
}

impl CalendarAlert {
    pub fn scheduled(
        event_id: ID,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        alarm_time: DateTime<Utc>,
        minutes: i32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Default::default(),
            event_id,
            begin,
            end,
            alarm_time,
            minutes,
            state: AlertState::Scheduled,
            creation_time: now,
            received_time: None,
            notify_time: None,
        }
    }
}
