mod alert;
mod attendee;
mod calendar;
mod event;
mod extended_property;
mod id;
mod instance;
pub mod recurrence;
mod reminder;
pub mod time;
mod timespan;

pub use alert::{AlertState, CalendarAlert};
pub use attendee::{Attendee, AttendeeStatus};
pub use calendar::Calendar;
pub use chrono::Weekday;
pub use chrono_tz::Tz;
pub use event::{CalendarEvent, EventStatus};
pub use extended_property::{ExtendedProperty, ORIGINAL_TIMEZONE_PROPERTY};
pub use id::{ID, ParseIdError};
pub use instance::Instance;
pub use recurrence::{
    EventDuration,
    Frequency,
    RecurrenceError,
    RecurrenceRule,
    RecurrenceSet,
    WeekdayNum,
};
pub use reminder::{Reminder, ReminderMethod};
pub use timespan::TimeSpan;
