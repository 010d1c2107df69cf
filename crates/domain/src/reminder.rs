use std::convert::TryFrom;

use serde::{Deserialize, Serialize};

use crate::id::ID;

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ReminderMethod {
    #[default]
    Default,
    Alert,
    Email,
    Sms,
}

impl From<ReminderMethod> for String {
    fn from(e: ReminderMethod) -> Self {
        match e {
            ReminderMethod::Default => "default".into(),
            ReminderMethod::Alert => "alert".into(),
            ReminderMethod::Email => "email".into(),
            ReminderMethod::Sms => "sms".into(),
        }
    }
}

impl TryFrom<String> for ReminderMethod {
    type Error = anyhow::Error;
    fn try_from(e: String) -> anyhow::Result<ReminderMethod> {
        Ok(match &e[..] {
            "default" => ReminderMethod::Default,
            "alert" => ReminderMethod::Alert,
            "email" => ReminderMethod::Email,
            "sms" => ReminderMethod::Sms,
            _ => Err(anyhow::anyhow!("Invalid reminder method"))?,
        })
    }
}

/// A reminder attached to an event: fire `minutes` before each instance
/// start, through `method`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub id: ID,
    pub event_id: ID,
    pub minutes: i32,
    pub method: ReminderMethod,
}

impl Reminder {
    pub fn new(event_id: ID, minutes: i32, method: ReminderMethod) -> Self {
        Self {
            id: Default::default(),
            event_id,
            minutes,
            method,
        }
    }
}
