//! Single-phone sagas.

use std::sync::Arc;

use saga::{SagaBuilder, SagaContext, SagaDefinition, StepDefinition, StepError, step_fn};

use super::{CTX_PARTY_ID, remove_compensation};
use crate::client::{CustomersClient, ResourceKind};
use crate::commands::{RegisterPhoneCommand, RemovePhoneCommand};

pub const ADD_SAGA_NAME: &str = "AddPhoneSaga";
pub const REMOVE_SAGA_NAME: &str = "RemovePhoneSaga";

pub const STEP_ADD_NEW_PHONE: &str = "addNewPhone";
pub const STEP_REMOVE_NEW_PHONE: &str = "removeNewPhone";

pub const COMPENSATE_REMOVE_PHONE: &str = "removePhone";

pub const EVENT_PHONE_ADDED: &str = "phone.added";
pub const EVENT_PHONE_REMOVED: &str = "phone.removed";

pub fn add_saga(client: &Arc<dyn CustomersClient>) -> SagaBuilder {
    let add = {
        let client = Arc::clone(client);
        step_fn(move |cmd: RegisterPhoneCommand, ctx: SagaContext| {
            let client = Arc::clone(&client);
            async move {
                let party_id = cmd
                    .party_id
                    .ok_or_else(|| StepError::invalid_input("phone command has no party id"))?;
                ctx.put(&CTX_PARTY_ID, party_id)?;
                let id = client.create_phone(party_id, &cmd).await?;
                Ok(Some(id))
            }
        })
    };

    SagaDefinition::builder(ADD_SAGA_NAME)
        .step(
            StepDefinition::new(STEP_ADD_NEW_PHONE)
                .compensate(COMPENSATE_REMOVE_PHONE)
                .event(EVENT_PHONE_ADDED)
                .requires_input(),
            add,
        )
        .compensation(
            COMPENSATE_REMOVE_PHONE,
            remove_compensation(client, ResourceKind::Phone),
        )
}

pub fn remove_saga(client: &Arc<dyn CustomersClient>) -> SagaBuilder {
    let client = Arc::clone(client);
    let remove = step_fn(move |cmd: RemovePhoneCommand, _ctx: SagaContext| {
        let client = Arc::clone(&client);
        async move {
            client
                .delete(ResourceKind::Phone, cmd.party_id, cmd.phone_id)
                .await?;
            Ok(None::<()>)
        }
    });

    SagaDefinition::builder(REMOVE_SAGA_NAME).step(
        StepDefinition::new(STEP_REMOVE_NEW_PHONE)
            .event(EVENT_PHONE_REMOVED)
            .requires_input(),
        remove,
    )
}
