use almanac_domain::{ID, Reminder, ReminderMethod};
use almanac_infra::AlmanacContext;
use tracing::error;

use crate::{error::ProviderError, shared::usecase::UseCase};

#[derive(Debug)]
pub enum ReminderUseCaseError {
    InvalidArgument(String),
    EventNotFound,
    ReminderNotFound,
    Conflict,
    StorageError,
}

impl From<ReminderUseCaseError> for ProviderError {
    fn from(e: ReminderUseCaseError) -> Self {
        match e {
            ReminderUseCaseError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            ReminderUseCaseError::EventNotFound => Self::NotFound("event".into()),
            ReminderUseCaseError::ReminderNotFound => Self::NotFound("reminder".into()),
            ReminderUseCaseError::Conflict => Self::Conflict("reminder already exists".into()),
            ReminderUseCaseError::StorageError => {
                Self::Transient(anyhow::anyhow!("reminder storage failure"))
            }
        }
    }
}

/// The legacy "calendar default" marker is not stored; callers must resolve
/// a concrete minute count before inserting.
fn validate_minutes(minutes: i32) -> Result<(), ReminderUseCaseError> {
    if minutes < 0 {
        return Err(ReminderUseCaseError::InvalidArgument(format!(
            "reminder minutes must be non-negative, got {}",
            minutes
        )));
    }
    Ok(())
}

#[derive(Debug)]
pub struct CreateReminderUseCase {
    pub event_id: ID,
    pub minutes: i32,
    pub method: ReminderMethod,
}

#[async_trait::async_trait]
impl UseCase for CreateReminderUseCase {
    type Response = Reminder;
    type Error = ReminderUseCaseError;

    const NAME: &'static str = "CreateReminder";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Error> {
        validate_minutes(self.minutes)?;
        ctx.repos
            .events
            .find(&self.event_id)
            .await
            .map_err(|_| ReminderUseCaseError::StorageError)?
            .ok_or(ReminderUseCaseError::EventNotFound)?;

        let reminder = Reminder::new(self.event_id.clone(), self.minutes, self.method);
        ctx.repos.reminders.insert(&reminder).await.map_err(|e| {
            error!(event_id = %self.event_id, error = ?e, "Unable to insert reminder");
            // The (event, minutes, method) triple is unique
            ReminderUseCaseError::Conflict
        })?;
        Ok(reminder)
    }
}

#[derive(Debug)]
pub struct UpdateReminderUseCase {
    pub reminder_id: ID,
    pub minutes: Option<i32>,
    pub method: Option<ReminderMethod>,
}

#[async_trait::async_trait]
impl UseCase for UpdateReminderUseCase {
    type Response = Reminder;
    type Error = ReminderUseCaseError;

    const NAME: &'static str = "UpdateReminder";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Error> {
        let mut reminder = ctx
            .repos
            .reminders
            .find(&self.reminder_id)
            .await
            .map_err(|_| ReminderUseCaseError::StorageError)?
            .ok_or(ReminderUseCaseError::ReminderNotFound)?;

        if let Some(minutes) = self.minutes {
            validate_minutes(minutes)?;
            reminder.minutes = minutes;
        }
        if let Some(method) = self.method {
            reminder.method = method;
        }
        ctx.repos.reminders.save(&reminder).await.map_err(|e| {
            error!(reminder_id = %self.reminder_id, error = ?e, "Unable to save reminder");
            ReminderUseCaseError::StorageError
        })?;
        Ok(reminder)
    }
}

#[derive(Debug)]
pub struct DeleteReminderUseCase {
    pub reminder_id: ID,
}

#[async_trait::async_trait]
impl UseCase for DeleteReminderUseCase {
    type Response = Reminder;
    type Error = ReminderUseCaseError;

    const NAME: &'static str = "DeleteReminder";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Error> {
        let reminder = ctx
            .repos
            .reminders
            .find(&self.reminder_id)
            .await
            .map_err(|_| ReminderUseCaseError::StorageError)?
            .ok_or(ReminderUseCaseError::ReminderNotFound)?;
        ctx.repos
            .reminders
            .delete(&self.reminder_id)
            .await
            .map_err(|e| {
                error!(reminder_id = %self.reminder_id, error = ?e, "Unable to delete reminder");
                ReminderUseCaseError::StorageError
            })?;
        Ok(reminder)
    }
}
