//! The URI surface external callers dispatch through. A thin adapter: it
//! parses paths like `instances/when/<begin>/<end>` and the
//! `caller_is_syncadapter` marker, then forwards to the typed entry points
//! on [`CalendarProvider`].

use std::str::FromStr;

use almanac_domain::{
    AlertState,
    Attendee,
    AttendeeStatus,
    Calendar,
    CalendarAlert,
    CalendarEvent,
    ID,
    Instance,
    ReminderMethod,
    Tz,
};

use crate::{
    calendar::{CreateCalendarUseCase, UpdateCalendarChanges},
    error::ProviderError,
    event::{EventPayload, UpdateEventChanges},
    provider::CalendarProvider,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriResource {
    Events,
    EventById(ID),
    Calendars,
    CalendarById(ID),
    Attendees,
    AttendeeById(ID),
    Reminders,
    ReminderById(ID),
    InstancesWhen { begin: i64, end: i64 },
    InstancesWhenByDay { start_day: i64, end_day: i64 },
    InstancesGroupByDay { start_day: i64, end_day: i64 },
    CalendarAlerts,
    CalendarAlertById(ID),
    CalendarAlertsByInstance { event_id: ID, begin: i64, end: i64 },
    ExtendedProperties,
    ExtendedPropertyById(ID),
    ScheduleAlarms,
    ScheduleAlarmsRemove,
    Properties,
}

/// A parsed provider URI plus its access marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarUri {
    pub resource: UriResource,
    pub caller_is_syncadapter: bool,
}

impl FromStr for CalendarUri {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ProviderError::InvalidArgument(format!("uri: {}", s));

        let (path, query) = match s.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (s, None),
        };
        let mut caller_is_syncadapter = false;
        if let Some(query) = query {
            for pair in query.split('&') {
                match pair.split_once('=') {
                    Some(("caller_is_syncadapter", value)) => {
                        caller_is_syncadapter = value == "true" || value == "1";
                    }
                    Some(_) => {}
                    None => return Err(bad()),
                }
            }
        }

        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let resource = match segments.as_slice() {
            ["events"] => UriResource::Events,
            ["events", id] => UriResource::EventById(parse_id(id, s)?),
            ["calendars"] => UriResource::Calendars,
            ["calendars", id] => UriResource::CalendarById(parse_id(id, s)?),
            ["attendees"] => UriResource::Attendees,
            ["attendees", id] => UriResource::AttendeeById(parse_id(id, s)?),
            ["reminders"] => UriResource::Reminders,
            ["reminders", id] => UriResource::ReminderById(parse_id(id, s)?),
            ["instances", "when", begin, end] => UriResource::InstancesWhen {
                begin: parse_ms(begin, s)?,
                end: parse_ms(end, s)?,
            },
            ["instances", "whenbyday", start, end] => UriResource::InstancesWhenByDay {
                start_day: parse_ms(start, s)?,
                end_day: parse_ms(end, s)?,
            },
            ["instances", "groupbyday", start, end] => UriResource::InstancesGroupByDay {
                start_day: parse_ms(start, s)?,
                end_day: parse_ms(end, s)?,
            },
            ["calendar_alerts"] => UriResource::CalendarAlerts,
            ["calendar_alerts", "by_instance", event_id, begin, end] => {
                UriResource::CalendarAlertsByInstance {
                    event_id: parse_id(event_id, s)?,
                    begin: parse_ms(begin, s)?,
                    end: parse_ms(end, s)?,
                }
            }
            ["calendar_alerts", id] => UriResource::CalendarAlertById(parse_id(id, s)?),
            ["extendedproperties"] => UriResource::ExtendedProperties,
            ["extendedproperties", id] => UriResource::ExtendedPropertyById(parse_id(id, s)?),
            ["schedule_alarms"] => UriResource::ScheduleAlarms,
            ["schedule_alarms_remove"] => UriResource::ScheduleAlarmsRemove,
            ["properties"] => UriResource::Properties,
            _ => return Err(bad()),
        };
        Ok(CalendarUri {
            resource,
            caller_is_syncadapter,
        })
    }
}

fn parse_id(s: &str, uri: &str) -> Result<ID, ProviderError> {
    s.parse::<ID>()
        .map_err(|_| ProviderError::InvalidArgument(format!("uri: {}", uri)))
}

fn parse_ms(s: &str, uri: &str) -> Result<i64, ProviderError> {
    s.parse::<i64>()
        .map_err(|_| ProviderError::InvalidArgument(format!("uri: {}", uri)))
}

/// Query results, shaped by the URI that was asked.
#[derive(Debug)]
pub enum UriQueryResult {
    Events(Vec<CalendarEvent>),
    Event(Option<CalendarEvent>),
    Calendars(Vec<Calendar>),
    Calendar(Option<Calendar>),
    Instances(Vec<Instance>),
    GroupedInstances(Vec<(i64, Vec<Instance>)>),
    Alerts(Vec<CalendarAlert>),
    Alert(Option<CalendarAlert>),
    Attendees(Vec<Attendee>),
    Properties(Vec<(String, Option<String>)>),
}

#[derive(Debug)]
pub enum UriInsertPayload {
    Event(EventPayload),
    Calendar {
        name: Option<String>,
        owner_account: Option<String>,
        timezone: Option<Tz>,
        selected: Option<bool>,
        sync_events: Option<bool>,
    },
    Reminder {
        event_id: ID,
        minutes: i32,
        method: ReminderMethod,
    },
    Attendee {
        event_id: ID,
        name: Option<String>,
        email: Option<String>,
        status: AttendeeStatus,
    },
    ExtendedProperty {
        event_id: ID,
        name: String,
        value: String,
    },
}

#[derive(Debug)]
pub enum UriUpdatePayload {
    Event(UpdateEventChanges),
    Calendar(UpdateCalendarChanges),
    Reminder {
        minutes: Option<i32>,
        method: Option<ReminderMethod>,
    },
    Attendee {
        name: Option<Option<String>>,
        email: Option<Option<String>>,
        status: Option<AttendeeStatus>,
    },
    AlertState(AlertState),
    Property {
        key: String,
        value: String,
    },
    /// schedule_alarms / schedule_alarms_remove carry no payload
    None,
}

impl CalendarProvider {
    pub async fn uri_query(&self, uri: &str) -> Result<UriQueryResult, ProviderError> {
        let uri: CalendarUri = uri.parse()?;
        match uri.resource {
            UriResource::Events => Ok(UriQueryResult::Events(self.get_events().await?)),
            UriResource::EventById(id) => Ok(UriQueryResult::Event(self.get_event(&id).await?)),
            UriResource::Calendars => Ok(UriQueryResult::Calendars(self.get_calendars().await?)),
            UriResource::CalendarById(id) => {
                Ok(UriQueryResult::Calendar(self.get_calendar(&id).await?))
            }
            UriResource::InstancesWhen { begin, end } => Ok(UriQueryResult::Instances(
                self.query_instances(begin, end).await?,
            )),
            UriResource::InstancesWhenByDay { start_day, end_day } => Ok(
                UriQueryResult::Instances(self.query_instances_by_day(start_day, end_day).await?),
            ),
            UriResource::InstancesGroupByDay { start_day, end_day } => {
                Ok(UriQueryResult::GroupedInstances(
                    self.query_instances_grouped_by_day(start_day, end_day).await?,
                ))
            }
            UriResource::CalendarAlerts => Ok(UriQueryResult::Alerts(self.get_alerts().await?)),
            UriResource::CalendarAlertById(id) => {
                Ok(UriQueryResult::Alert(self.get_alert(&id).await?))
            }
            UriResource::CalendarAlertsByInstance {
                event_id,
                begin,
                end,
            } => Ok(UriQueryResult::Alerts(
                self.get_alerts_by_instance(&event_id, begin, end).await?,
            )),
            UriResource::Properties => Ok(UriQueryResult::Properties(self.get_properties().await?)),
            UriResource::Attendees
            | UriResource::AttendeeById(_)
            | UriResource::Reminders
            | UriResource::ReminderById(_)
            | UriResource::ExtendedProperties
            | UriResource::ExtendedPropertyById(_)
            | UriResource::ScheduleAlarms
            | UriResource::ScheduleAlarmsRemove => Err(ProviderError::Unsupported(format!(
                "query on {:?}",
                uri.resource
            ))),
        }
    }

    /// Insert through a collection URI; returns the URI of the created row.
    pub async fn uri_insert(
        &self,
        uri: &str,
        payload: UriInsertPayload,
    ) -> Result<String, ProviderError> {
        let uri: CalendarUri = uri.parse()?;
        let syncadapter = uri.caller_is_syncadapter;
        match (uri.resource, payload) {
            (UriResource::Events, UriInsertPayload::Event(payload)) => {
                let event = self.create_event(payload, syncadapter).await?;
                Ok(format!("events/{}", event.id))
            }
            (
                UriResource::Calendars,
                UriInsertPayload::Calendar {
                    name,
                    owner_account,
                    timezone,
                    selected,
                    sync_events,
                },
            ) => {
                let calendar = self
                    .create_calendar(CreateCalendarUseCase {
                        name,
                        owner_account,
                        timezone,
                        selected,
                        sync_events,
                    })
                    .await?;
                Ok(format!("calendars/{}", calendar.id))
            }
            (
                UriResource::Reminders,
                UriInsertPayload::Reminder {
                    event_id,
                    minutes,
                    method,
                },
            ) => {
                let reminder = self
                    .create_reminder(event_id, minutes, method, syncadapter)
                    .await?;
                Ok(format!("reminders/{}", reminder.id))
            }
            (
                UriResource::Attendees,
                UriInsertPayload::Attendee {
                    event_id,
                    name,
                    email,
                    status,
                },
            ) => {
                let attendee = self
                    .create_attendee(event_id, name, email, status, syncadapter)
                    .await?;
                Ok(format!("attendees/{}", attendee.id))
            }
            (
                UriResource::ExtendedProperties,
                UriInsertPayload::ExtendedProperty {
                    event_id,
                    name,
                    value,
                },
            ) => {
                let property = self
                    .create_extended_property(event_id, name, value, syncadapter)
                    .await?;
                Ok(format!("extendedproperties/{}", property.id))
            }
            (
                resource @ (UriResource::InstancesWhen { .. }
                | UriResource::InstancesWhenByDay { .. }
                | UriResource::InstancesGroupByDay { .. }
                | UriResource::ScheduleAlarms
                | UriResource::ScheduleAlarmsRemove
                | UriResource::Properties),
                _,
            ) => Err(ProviderError::Unsupported(format!(
                "insert on {:?}",
                resource
            ))),
            (resource, payload) => Err(ProviderError::InvalidArgument(format!(
                "insert {:?} on {:?}",
                payload, resource
            ))),
        }
    }

    pub async fn uri_update(
        &self,
        uri: &str,
        payload: UriUpdatePayload,
    ) -> Result<(), ProviderError> {
        let uri: CalendarUri = uri.parse()?;
        let syncadapter = uri.caller_is_syncadapter;
        match (uri.resource, payload) {
            (UriResource::EventById(id), UriUpdatePayload::Event(changes)) => {
                self.update_event(id, changes, syncadapter).await?;
                Ok(())
            }
            (UriResource::CalendarById(id), UriUpdatePayload::Calendar(changes)) => {
                self.update_calendar(id, changes).await?;
                Ok(())
            }
            (UriResource::ReminderById(id), UriUpdatePayload::Reminder { minutes, method }) => {
                self.update_reminder(id, minutes, method, syncadapter).await?;
                Ok(())
            }
            (
                UriResource::AttendeeById(id),
                UriUpdatePayload::Attendee {
                    name,
                    email,
                    status,
                },
            ) => {
                self.update_attendee(id, name, email, status, syncadapter).await?;
                Ok(())
            }
            (UriResource::CalendarAlertById(id), UriUpdatePayload::AlertState(state)) => {
                match state {
                    AlertState::Fired => self.mark_alert_fired(&id).await,
                    AlertState::Dismissed => self.dismiss_alert(&id).await,
                    AlertState::Scheduled => Err(ProviderError::InvalidArgument(
                        "alerts cannot be re-scheduled through the uri surface".into(),
                    )),
                }
            }
            (UriResource::Properties, UriUpdatePayload::Property { key, value }) => {
                self.set_property(&key, &value).await
            }
            (UriResource::ScheduleAlarms, _) => {
                self.schedule_next(false);
                Ok(())
            }
            (UriResource::ScheduleAlarmsRemove, _) => {
                self.schedule_next(true);
                Ok(())
            }
            (
                resource @ (UriResource::InstancesWhen { .. }
                | UriResource::InstancesWhenByDay { .. }
                | UriResource::InstancesGroupByDay { .. }),
                _,
            ) => Err(ProviderError::Unsupported(format!(
                "update on {:?}",
                resource
            ))),
            (resource, payload) => Err(ProviderError::InvalidArgument(format!(
                "update {:?} on {:?}",
                payload, resource
            ))),
        }
    }

    pub async fn uri_delete(&self, uri: &str) -> Result<(), ProviderError> {
        let uri: CalendarUri = uri.parse()?;
        let syncadapter = uri.caller_is_syncadapter;
        match uri.resource {
            UriResource::EventById(id) => self.delete_event(id, syncadapter).await,
            UriResource::CalendarById(id) => self.delete_calendar(id).await,
            UriResource::ReminderById(id) => self.delete_reminder(id, syncadapter).await,
            UriResource::AttendeeById(id) => self.delete_attendee(id, syncadapter).await,
            UriResource::ExtendedPropertyById(id) => {
                self.delete_extended_property(id, syncadapter).await
            }
            UriResource::CalendarAlertById(id) => {
                Ok(self.context().repos.alerts.delete(&id).await?)
            }
            resource => Err(ProviderError::Unsupported(format!(
                "delete on {:?}",
                resource
            ))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_instance_range_uris() {
        let uri: CalendarUri = "instances/when/1000/2000".parse().unwrap();
        assert_eq!(
            uri.resource,
            UriResource::InstancesWhen {
                begin: 1000,
                end: 2000
            }
        );
        assert!(!uri.caller_is_syncadapter);

        let uri: CalendarUri = "instances/groupbyday/2460000/2460007".parse().unwrap();
        assert_eq!(
            uri.resource,
            UriResource::InstancesGroupByDay {
                start_day: 2460000,
                end_day: 2460007
            }
        );
    }

    #[test]
    fn parses_the_syncadapter_marker() {
        let id = ID::new();
        let uri: CalendarUri = format!("events/{}?caller_is_syncadapter=true", id)
            .parse()
            .unwrap();
        assert_eq!(uri.resource, UriResource::EventById(id));
        assert!(uri.caller_is_syncadapter);
    }

    #[test]
    fn rejects_unknown_uris() {
        assert!("nope".parse::<CalendarUri>().is_err());
        assert!("instances/when/abc/2000".parse::<CalendarUri>().is_err());
        assert!("events/not-a-uuid".parse::<CalendarUri>().is_err());
        assert!("instances/when/1000".parse::<CalendarUri>().is_err());
    }
}
