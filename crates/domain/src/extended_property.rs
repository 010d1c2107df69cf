use crate::id::ID;

/// Reserved key recording the zone an event was first inserted with.
pub const ORIGINAL_TIMEZONE_PROPERTY: &str = "originalTimezone";

/// Key/value side-data attached to an event.
#[derive(Debug, Clone)]
pub struct ExtendedProperty {
    pub id: ID,
    pub event_id: ID,
    pub name: String,
    pub value: String,
}

impl ExtendedProperty {
    pub fn new(event_id: ID, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: Default::default(),
            event_id,
            name: name.into(),
            value: value.into(),
        }
    }
}
