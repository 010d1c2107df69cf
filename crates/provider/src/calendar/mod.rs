use almanac_domain::{Calendar, ID, Tz};
use almanac_infra::AlmanacContext;
use tracing::error;

use crate::{error::ProviderError, shared::usecase::UseCase};

#[derive(Debug)]
pub enum CalendarUseCaseError {
    NotFound,
    StorageError,
}

impl From<CalendarUseCaseError> for ProviderError {
    fn from(e: CalendarUseCaseError) -> Self {
        match e {
            CalendarUseCaseError::NotFound => Self::NotFound("calendar".into()),
            CalendarUseCaseError::StorageError => {
                Self::Transient(anyhow::anyhow!("calendar storage failure"))
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct CreateCalendarUseCase {
    pub name: Option<String>,
    pub owner_account: Option<String>,
    pub timezone: Option<Tz>,
    pub selected: Option<bool>,
    pub sync_events: Option<bool>,
}

#[async_trait::async_trait]
impl UseCase for CreateCalendarUseCase {
    type Response = Calendar;
    type Error = CalendarUseCaseError;

    const NAME: &'static str = "CreateCalendar";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Error> {
        let mut calendar = Calendar::new(self.name.clone(), self.owner_account.clone());
        if let Some(timezone) = self.timezone {
            calendar.timezone = timezone;
        }
        if let Some(selected) = self.selected {
            calendar.selected = selected;
        }
        if let Some(sync_events) = self.sync_events {
            calendar.sync_events = sync_events;
        }
        ctx.repos.calendars.insert(&calendar).await.map_err(|e| {
            error!(calendar_id = %calendar.id, error = ?e, "Unable to insert calendar");
            CalendarUseCaseError::StorageError
        })?;
        Ok(calendar)
    }
}

#[derive(Debug, Default)]
pub struct UpdateCalendarChanges {
    pub name: Option<Option<String>>,
    pub owner_account: Option<Option<String>>,
    pub timezone: Option<Tz>,
    pub selected: Option<bool>,
    pub sync_events: Option<bool>,
}

#[derive(Debug)]
pub struct UpdateCalendarUseCase {
    pub calendar_id: ID,
    pub changes: UpdateCalendarChanges,
}

#[async_trait::async_trait]
impl UseCase for UpdateCalendarUseCase {
    type Response = Calendar;
    type Error = CalendarUseCaseError;

    const NAME: &'static str = "UpdateCalendar";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Error> {
        let mut calendar = ctx
            .repos
            .calendars
            .find(&self.calendar_id)
            .await
            .map_err(|_| CalendarUseCaseError::StorageError)?
            .ok_or(CalendarUseCaseError::NotFound)?;

        if let Some(name) = self.changes.name.clone() {
            calendar.name = name;
        }
        if let Some(owner_account) = self.changes.owner_account.clone() {
            calendar.owner_account = owner_account;
        }
        if let Some(timezone) = self.changes.timezone {
            calendar.timezone = timezone;
        }
        if let Some(selected) = self.changes.selected {
            calendar.selected = selected;
        }
        if let Some(sync_events) = self.changes.sync_events {
            calendar.sync_events = sync_events;
        }

        ctx.repos.calendars.save(&calendar).await.map_err(|e| {
            error!(calendar_id = %calendar.id, error = ?e, "Unable to save calendar");
            CalendarUseCaseError::StorageError
        })?;
        Ok(calendar)
    }
}

/// Deleting a calendar cascades to its events and their instances.
#[derive(Debug)]
pub struct DeleteCalendarUseCase {
    pub calendar_id: ID,
}

#[async_trait::async_trait]
impl UseCase for DeleteCalendarUseCase {
    type Response = ();
    type Error = CalendarUseCaseError;

    const NAME: &'static str = "DeleteCalendar";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Error> {
        ctx.repos
            .calendars
            .find(&self.calendar_id)
            .await
            .map_err(|_| CalendarUseCaseError::StorageError)?
            .ok_or(CalendarUseCaseError::NotFound)?;
        ctx.repos
            .calendars
            .delete(&self.calendar_id)
            .await
            .map_err(|e| {
                error!(calendar_id = %self.calendar_id, error = ?e, "Unable to delete calendar");
                CalendarUseCaseError::StorageError
            })?;
        Ok(())
    }
}
