use std::convert::TryFrom;

use almanac_domain::{ExtendedProperty, ID};
use sqlx::{FromRow, SqlitePool, types::Uuid};
use tracing::{error, instrument};

use super::IExtendedPropertyRepo;

#[derive(Debug)]
pub struct SqliteExtendedPropertyRepo {
    pool: SqlitePool,
}

impl SqliteExtendedPropertyRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ExtendedPropertyRaw {
    property_uid: Uuid,
    event_uid: Uuid,
    name: String,
    value: String,
}

impl From<ExtendedPropertyRaw> for ExtendedProperty {
    fn from(p: ExtendedPropertyRaw) -> Self {
        Self {
            id: p.property_uid.into(),
            event_id: p.event_uid.into(),
            name: p.name,
            value: p.value,
        }
    }
}

#[async_trait::async_trait]
impl IExtendedPropertyRepo for SqliteExtendedPropertyRepo {
    #[instrument(skip(self))]
    async fn insert(&self, property: &ExtendedProperty) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO extended_properties(property_uid, event_uid, name, value)
            VALUES(?, ?, ?, ?)
            "#,
        )
        .bind(property.id.as_ref())
        .bind(property.event_id.as_ref())
        .bind(&property.name)
        .bind(&property.value)
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Unable to insert extended property: {:?}. DB returned error: {:?}",
                property, err
            );
        })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn save(&self, property: &ExtendedProperty) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE extended_properties SET name = ?, value = ?
            WHERE property_uid = ?
            "#,
        )
        .bind(&property.name)
        .bind(&property.value)
        .bind(property.id.as_ref())
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Unable to save extended property: {:?}. DB returned error: {:?}",
                property, err
            );
        })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find(&self, property_id: &ID) -> anyhow::Result<Option<ExtendedProperty>> {
        Ok(sqlx::query_as::<_, ExtendedPropertyRaw>(
            r#"
            SELECT * FROM extended_properties
            WHERE property_uid = ?
            "#,
        )
        .bind(property_id.as_ref())
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Find extended property with id: {} failed. DB returned error: {:?}",
                property_id, err
            );
        })?
        .map(ExtendedProperty::from))
    }

    #[instrument(skip(self))]
    async fn find_by_event(&self, event_id: &ID) -> anyhow::Result<Vec<ExtendedProperty>> {
        Ok(sqlx::query_as::<_, ExtendedPropertyRaw>(
            r#"
            SELECT * FROM extended_properties
            WHERE event_uid = ?
            ORDER BY name
            "#,
        )
        .bind(event_id.as_ref())
        .fetch_all(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Find extended properties for event: {} failed. DB returned error: {:?}",
                event_id, err
            );
        })?
        .into_iter()
        .map(ExtendedProperty::from)
        .collect())
    }

    #[instrument(skip(self))]
    async fn delete(&self, property_id: &ID) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            DELETE FROM extended_properties
            WHERE property_uid = ?
            "#,
        )
        .bind(property_id.as_ref())
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Delete extended property with id: {} failed. DB returned error: {:?}",
                property_id, err
            );
        })?;
        Ok(())
    }
}
