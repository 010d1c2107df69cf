use almanac_domain::{CalendarEvent, ID};
use almanac_infra::AlmanacContext;
use tracing::error;

use super::EventUseCaseError;
use crate::shared::usecase::UseCase;

/// Sync adapters delete rows outright; everyone else leaves a tombstone for
/// the adapter to pick up. Either way the event's instances disappear.
#[derive(Debug)]
pub struct DeleteEventUseCase {
    pub event_id: ID,
    pub caller_is_syncadapter: bool,
}

#[async_trait::async_trait]
impl UseCase for DeleteEventUseCase {
    type Response = CalendarEvent;
    type Error = EventUseCaseError;

    const NAME: &'static str = "DeleteEvent";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Error> {
        let mut event = ctx
            .repos
            .events
            .find(&self.event_id)
            .await
            .map_err(|_| EventUseCaseError::StorageError)?
            .ok_or(EventUseCaseError::EventNotFound)?;

        event.deleted = true;
        if self.caller_is_syncadapter {
            ctx.repos.events.delete(&self.event_id).await.map_err(|e| {
                error!(event_id = %self.event_id, error = ?e, "Unable to delete event");
                EventUseCaseError::StorageError
            })?;
        } else {
            event.sync_dirty = true;
            ctx.repos.events.save(&event).await.map_err(|e| {
                error!(event_id = %self.event_id, error = ?e, "Unable to tombstone event");
                EventUseCaseError::StorageError
            })?;
            // The row stays for the sync adapter, its instances must not
            ctx.repos
                .instances
                .delete_for_event(&self.event_id)
                .await
                .map_err(|_| EventUseCaseError::StorageError)?;
        }

        Ok(event)
    }
}
