use std::convert::TryFrom;

use crate::id::ID;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AttendeeStatus {
    #[default]
    None,
    Accepted,
    Declined,
    Invited,
    Tentative,
}

impl From<AttendeeStatus> for String {
    fn from(e: AttendeeStatus) -> Self {
        match e {
            AttendeeStatus::None => "none".into(),
            AttendeeStatus::Accepted => "accepted".into(),
            AttendeeStatus::Declined => "declined".into(),
            AttendeeStatus::Invited => "invited".into(),
            AttendeeStatus::Tentative => "tentative".into(),
        }
    }
}

impl TryFrom<String> for AttendeeStatus {
    type Error = anyhow::Error;
    fn try_from(e: String) -> anyhow::Result<AttendeeStatus> {
        Ok(match &e[..] {
            "none" => AttendeeStatus::None,
            "accepted" => AttendeeStatus::Accepted,
            "declined" => AttendeeStatus::Declined,
            "invited" => AttendeeStatus::Invited,
            "tentative" => AttendeeStatus::Tentative,
            _ => Err(anyhow::anyhow!("Invalid attendee status"))?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Attendee {
    pub id: ID,
    pub event_id: ID,
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: AttendeeStatus,
}
