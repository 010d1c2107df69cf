use chrono_tz::{Tz, UTC};

use crate::id::ID;

/// A calendar groups events and carries the zone its events are entered in.
#[derive(Debug, Clone)]
pub struct Calendar {
    pub id: ID,
    pub name: Option<String>,
    pub owner_account: Option<String>,
    pub timezone: Tz,
    /// Deselected calendars stay in the database but do not contribute
    /// alarms.
    pub selected: bool,
    pub sync_events: bool,
}

impl Default for Calendar {
    fn default() -> Self {
        Self {
            id: Default::default(),
            name: None,
            owner_account: None,
            timezone: UTC,
            selected: true,
            sync_events: true,
        }
    }
}

impl Calendar {
    pub fn new(name: Option<String>, owner_account: Option<String>) -> Self {
        Self {
            name,
            owner_account,
            ..Default::default()
        }
    }
}
