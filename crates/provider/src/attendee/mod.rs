use almanac_domain::{Attendee, AttendeeStatus, ID};
use almanac_infra::AlmanacContext;
use tracing::error;

use crate::{error::ProviderError, shared::usecase::UseCase};

#[derive(Debug)]
pub enum AttendeeUseCaseError {
    EventNotFound,
    AttendeeNotFound,
    StorageError,
}

impl From<AttendeeUseCaseError> for ProviderError {
    fn from(e: AttendeeUseCaseError) -> Self {
        match e {
            AttendeeUseCaseError::EventNotFound => Self::NotFound("event".into()),
            AttendeeUseCaseError::AttendeeNotFound => Self::NotFound("attendee".into()),
            AttendeeUseCaseError::StorageError => {
                Self::Transient(anyhow::anyhow!("attendee storage failure"))
            }
        }
    }
}

#[derive(Debug)]
pub struct CreateAttendeeUseCase {
    pub event_id: ID,
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: AttendeeStatus,
}

#[async_trait::async_trait]
impl UseCase for CreateAttendeeUseCase {
    type Response = Attendee;
    type Error = AttendeeUseCaseError;

    const NAME: &'static str = "CreateAttendee";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Error> {
        ctx.repos
            .events
            .find(&self.event_id)
            .await
            .map_err(|_| AttendeeUseCaseError::StorageError)?
            .ok_or(AttendeeUseCaseError::EventNotFound)?;

        let attendee = Attendee {
            event_id: self.event_id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            status: self.status,
            ..Default::default()
        };
        ctx.repos.attendees.insert(&attendee).await.map_err(|e| {
            error!(event_id = %self.event_id, error = ?e, "Unable to insert attendee");
            AttendeeUseCaseError::StorageError
        })?;

        sync_self_attendee_status(ctx, &attendee).await?;
        Ok(attendee)
    }
}

#[derive(Debug)]
pub struct UpdateAttendeeUseCase {
    pub attendee_id: ID,
    pub name: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub status: Option<AttendeeStatus>,
}

#[async_trait::async_trait]
impl UseCase for UpdateAttendeeUseCase {
    type Response = Attendee;
    type Error = AttendeeUseCaseError;

    const NAME: &'static str = "UpdateAttendee";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Error> {
        let mut attendee = ctx
            .repos
            .attendees
            .find(&self.attendee_id)
            .await
            .map_err(|_| AttendeeUseCaseError::StorageError)?
            .ok_or(AttendeeUseCaseError::AttendeeNotFound)?;

        if let Some(name) = self.name.clone() {
            attendee.name = name;
        }
        if let Some(email) = self.email.clone() {
            attendee.email = email;
        }
        if let Some(status) = self.status {
            attendee.status = status;
        }
        ctx.repos.attendees.save(&attendee).await.map_err(|e| {
            error!(attendee_id = %self.attendee_id, error = ?e, "Unable to save attendee");
            AttendeeUseCaseError::StorageError
        })?;

        sync_self_attendee_status(ctx, &attendee).await?;
        Ok(attendee)
    }
}

#[derive(Debug)]
pub struct DeleteAttendeeUseCase {
    pub attendee_id: ID,
}

#[async_trait::async_trait]
impl UseCase for DeleteAttendeeUseCase {
    type Response = Attendee;
    type Error = AttendeeUseCaseError;

    const NAME: &'static str = "DeleteAttendee";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Error> {
        let attendee = ctx
            .repos
            .attendees
            .find(&self.attendee_id)
            .await
            .map_err(|_| AttendeeUseCaseError::StorageError)?
            .ok_or(AttendeeUseCaseError::AttendeeNotFound)?;
        ctx.repos
            .attendees
            .delete(&self.attendee_id)
            .await
            .map_err(|e| {
                error!(attendee_id = %self.attendee_id, error = ?e, "Unable to delete attendee");
                AttendeeUseCaseError::StorageError
            })?;
        Ok(attendee)
    }
}

/// When the attendee is the calendar owner, their status mirrors onto the
/// event so list views can show it without joining attendees.
async fn sync_self_attendee_status(
    ctx: &AlmanacContext,
    attendee: &Attendee,
) -> Result<(), AttendeeUseCaseError> {
    let Some(email) = &attendee.email else {
        return Ok(());
    };
    let Some(mut event) = ctx
        .repos
        .events
        .find(&attendee.event_id)
        .await
        .map_err(|_| AttendeeUseCaseError::StorageError)?
    else {
        return Ok(());
    };
    let Some(calendar) = ctx
        .repos
        .calendars
        .find(&event.calendar_id)
        .await
        .map_err(|_| AttendeeUseCaseError::StorageError)?
    else {
        return Ok(());
    };
    if calendar.owner_account.as_deref() == Some(email.as_str()) {
        event.self_attendee_status = attendee.status;
        ctx.repos.events.save(&event).await.map_err(|e| {
            error!(event_id = %event.id, error = ?e, "Unable to mirror self attendee status");
            AttendeeUseCaseError::StorageError
        })?;
    }
    Ok(())
}
