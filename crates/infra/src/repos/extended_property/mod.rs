mod sqlite;

use almanac_domain::{ExtendedProperty, ID};
pub use sqlite::SqliteExtendedPropertyRepo;

#[async_trait::async_trait]
pub trait IExtendedPropertyRepo: Send + Sync {
    async fn insert(&self, property: &ExtendedProperty) -> anyhow::Result<()>;
    async fn save(&self, property: &ExtendedProperty) -> anyhow::Result<()>;
    async fn find(&self, property_id: &ID) -> anyhow::Result<Option<ExtendedProperty>>;
    async fn find_by_event(&self, event_id: &ID) -> anyhow::Result<Vec<ExtendedProperty>>;
    async fn delete(&self, property_id: &ID) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use almanac_domain::{Calendar, CalendarEvent, ExtendedProperty};
    use chrono::DateTime;

    use crate::setup_test_context;

    #[tokio::test]
    async fn crud() {
        let ctx = setup_test_context().await.unwrap();
        let calendar = Calendar::default();
        ctx.repos.calendars.insert(&calendar).await.unwrap();
        let event = CalendarEvent {
            calendar_id: calendar.id.clone(),
            dtstart: DateTime::from_timestamp_millis(0).unwrap(),
            dtend: Some(DateTime::from_timestamp_millis(1000).unwrap()),
            ..Default::default()
        };
        ctx.repos.events.insert(&event).await.unwrap();

        let property = ExtendedProperty::new(event.id.clone(), "color", "#ff0000");
        ctx.repos.extended_properties.insert(&property).await.unwrap();

        let by_event = ctx
            .repos
            .extended_properties
            .find_by_event(&event.id)
            .await
            .unwrap();
        assert_eq!(by_event.len(), 1);
        assert_eq!(by_event[0].name, "color");
        assert_eq!(by_event[0].value, "#ff0000");

        let mut updated = property.clone();
        updated.value = "#00ff00".into();
        ctx.repos.extended_properties.save(&updated).await.unwrap();
        let found = ctx
            .repos
            .extended_properties
            .find(&property.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.value, "#00ff00");

        ctx.repos.extended_properties.delete(&property.id).await.unwrap();
        assert!(
            ctx.repos
                .extended_properties
                .find(&property.id)
                .await
                .unwrap()
                .is_none()
        );
    }
}
