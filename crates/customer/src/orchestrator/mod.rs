//! Saga definitions for customer operations.
//!
//! Every step calls the [`CustomersClient`]; steps that create something
//! record the new id as their output so the matching compensation can
//! delete it again.

pub mod address;
pub mod channel;
pub mod email;
pub mod phone;
pub mod register_customer;
pub mod status;
pub mod update_name;

use std::future::Future;
use std::sync::Arc;

use saga::{
    CompensationHandler, ContextKey, SagaContext, StepHandler, StepRegistry, ValidationError,
    compensation_fn, step_fn,
};
use serde::de::DeserializeOwned;

use crate::client::{CustomersClient, ResourceKind};
use crate::error::ClientError;

/// Party kind of the customer being registered.
///
/// Written by `registerParty` together with [`CTX_PARTY_ID`], only once the
/// party exists; a registration whose party could not be created leaves
/// both keys unset and every kind-specific step is never evaluated.
pub const CTX_CUSTOMER_TYPE: ContextKey<String> = ContextKey::new("customerType");
/// Party every step of a saga works on.
pub const CTX_PARTY_ID: ContextKey<i64> = ContextKey::new("partyId");
/// Natural-person or legal-entity record of the party.
pub const CTX_CUSTOMER_ID: ContextKey<i64> = ContextKey::new("customerId");

/// Registers every customer saga.
pub fn register_all(
    registry: &mut StepRegistry,
    client: &Arc<dyn CustomersClient>,
) -> Result<(), ValidationError> {
    registry.register(register_customer::saga(client))?;
    registry.register(update_name::saga(client))?;
    registry.register(address::add_saga(client))?;
    registry.register(address::update_saga(client))?;
    registry.register(address::remove_saga(client))?;
    registry.register(email::add_saga(client))?;
    registry.register(email::remove_saga(client))?;
    registry.register(phone::add_saga(client))?;
    registry.register(phone::remove_saga(client))?;
    registry.register(channel::saga(client))?;
    registry.register(status::saga(client))?;
    Ok(())
}

/// Step that creates a sub-resource of the party in [`CTX_PARTY_ID`] and
/// outputs its id.
pub(crate) fn create_step<C, F, Fut>(client: &Arc<dyn CustomersClient>, create: F) -> StepHandler
where
    C: DeserializeOwned + Send + 'static,
    F: Fn(Arc<dyn CustomersClient>, i64, C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<i64, ClientError>> + Send + 'static,
{
    let client = Arc::clone(client);
    step_fn(move |cmd: C, ctx: SagaContext| {
        let created = ctx
            .require(&CTX_PARTY_ID)
            .map(|party_id| create(Arc::clone(&client), party_id, cmd));
        async move {
            let id = created?.await?;
            Ok(Some(id))
        }
    })
}

/// Compensation deleting the resource whose id the step output.
///
/// A step that output nothing created nothing, so there is nothing to delete.
pub(crate) fn remove_compensation(
    client: &Arc<dyn CustomersClient>,
    kind: ResourceKind,
) -> CompensationHandler {
    let client = Arc::clone(client);
    compensation_fn(move |id: Option<i64>, ctx: SagaContext| {
        let client = Arc::clone(&client);
        let party_id = ctx.require(&CTX_PARTY_ID);
        async move {
            let Some(id) = id else {
                return Ok(());
            };
            let party_id = match kind {
                ResourceKind::Party => id,
                _ => party_id?,
            };
            client.delete(kind, party_id, id).await?;
            Ok(())
        }
    })
}
