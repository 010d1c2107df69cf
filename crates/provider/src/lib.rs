mod alarm;
mod attendee;
mod calendar;
mod error;
mod event;
mod extended_property;
mod instances;
mod provider;
mod reminder;
mod shared;
mod uri;

pub use alarm::{AlarmHost, AlarmScheduler, TracingAlarmHost};
pub use calendar::{CreateCalendarUseCase, UpdateCalendarChanges};
pub use error::ProviderError;
pub use event::{EventPayload, UpdateEventChanges};
pub use instances::InstancesCache;
pub use provider::CalendarProvider;
pub use uri::{CalendarUri, UriInsertPayload, UriQueryResult, UriResource, UriUpdatePayload};
