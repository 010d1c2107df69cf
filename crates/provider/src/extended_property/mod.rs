use almanac_domain::{ExtendedProperty, ID};
use almanac_infra::AlmanacContext;
use tracing::error;

use crate::{error::ProviderError, shared::usecase::UseCase};

#[derive(Debug)]
pub enum ExtendedPropertyUseCaseError {
    EventNotFound,
    PropertyNotFound,
    StorageError,
}

impl From<ExtendedPropertyUseCaseError> for ProviderError {
    fn from(e: ExtendedPropertyUseCaseError) -> Self {
        match e {
            ExtendedPropertyUseCaseError::EventNotFound => Self::NotFound("event".into()),
            ExtendedPropertyUseCaseError::PropertyNotFound => {
                Self::NotFound("extended property".into())
            }
            ExtendedPropertyUseCaseError::StorageError => {
                Self::Transient(anyhow::anyhow!("extended property storage failure"))
            }
        }
    }
}

#[derive(Debug)]
pub struct CreateExtendedPropertyUseCase {
    pub event_id: ID,
    pub name: String,
    pub value: String,
}

#[async_trait::async_trait]
impl UseCase for CreateExtendedPropertyUseCase {
    type Response = ExtendedProperty;
    type Error = ExtendedPropertyUseCaseError;

    const NAME: &'static str = "CreateExtendedProperty";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Error> {
        ctx.repos
            .events
            .find(&self.event_id)
            .await
            .map_err(|_| ExtendedPropertyUseCaseError::StorageError)?
            .ok_or(ExtendedPropertyUseCaseError::EventNotFound)?;

        let property =
            ExtendedProperty::new(self.event_id.clone(), self.name.clone(), self.value.clone());
        ctx.repos
            .extended_properties
            .insert(&property)
            .await
            .map_err(|e| {
                error!(event_id = %self.event_id, error = ?e, "Unable to insert extended property");
                ExtendedPropertyUseCaseError::StorageError
            })?;
        Ok(property)
    }
}

#[derive(Debug)]
pub struct DeleteExtendedPropertyUseCase {
    pub property_id: ID,
}

#[async_trait::async_trait]
impl UseCase for DeleteExtendedPropertyUseCase {
    type Response = ExtendedProperty;
    type Error = ExtendedPropertyUseCaseError;

    const NAME: &'static str = "DeleteExtendedProperty";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Error> {
        let property = ctx
            .repos
            .extended_properties
            .find(&self.property_id)
            .await
            .map_err(|_| ExtendedPropertyUseCaseError::StorageError)?
            .ok_or(ExtendedPropertyUseCaseError::PropertyNotFound)?;
        ctx.repos
            .extended_properties
            .delete(&self.property_id)
            .await
            .map_err(|e| {
                error!(property_id = %self.property_id, error = ?e, "Unable to delete extended property");
                ExtendedPropertyUseCaseError::StorageError
            })?;
        Ok(property)
    }
}
