use std::{fmt::Display, str::FromStr};

use thiserror::Error;
use uuid::Uuid;

/// Identifier of a calendar, event, reminder, alert, attendee or extended
/// property row. UUIDs let sync adapters mint ids for rows they create
/// without a round trip through the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ID(Uuid);

impl ID {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ID {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ID {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<ID> for Uuid {
    fn from(id: ID) -> Self {
        id.0
    }
}

impl AsRef<Uuid> for ID {
    fn as_ref(&self) -> &Uuid {
        &self.0
    }
}

impl Display for ID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A path segment that was supposed to name a row did not parse as a UUID.
#[derive(Error, Debug)]
#[error("malformed row id: {0}")]
pub struct ParseIdError(String);

impl FromStr for ID {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Uuid>()
            .map(Self)
            .map_err(|_| ParseIdError(s.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_through_its_string_form() {
        let id = ID::new();
        let parsed = id.to_string().parse::<ID>().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn fresh_ids_do_not_collide() {
        assert_ne!(ID::new(), ID::new());
    }

    #[test]
    fn rejects_non_uuid_segments() {
        assert!("7".parse::<ID>().is_err());
        assert!("not-a-uuid".parse::<ID>().is_err());
    }
}
