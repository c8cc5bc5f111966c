//! Single-email sagas.

use std::sync::Arc;

use saga::{SagaBuilder, SagaContext, SagaDefinition, StepDefinition, StepError, step_fn};

use super::{CTX_PARTY_ID, remove_compensation};
use crate::client::{CustomersClient, ResourceKind};
use crate::commands::{RegisterEmailCommand, RemoveEmailCommand};

pub const ADD_SAGA_NAME: &str = "AddEmailSaga";
pub const REMOVE_SAGA_NAME: &str = "RemoveEmailSaga";

pub const STEP_ADD_NEW_EMAIL: &str = "addNewEmail";
pub const STEP_REMOVE_NEW_EMAIL: &str = "removeNewEmail";

pub const COMPENSATE_REMOVE_EMAIL: &str = "removeEmail";

pub const EVENT_EMAIL_ADDED: &str = "email.added";
pub const EVENT_EMAIL_REMOVED: &str = "email.removed";

pub fn add_saga(client: &Arc<dyn CustomersClient>) -> SagaBuilder {
    let add = {
        let client = Arc::clone(client);
        step_fn(move |cmd: RegisterEmailCommand, ctx: SagaContext| {
            let client = Arc::clone(&client);
            async move {
                let party_id = cmd
                    .party_id
                    .ok_or_else(|| StepError::invalid_input("email command has no party id"))?;
                ctx.put(&CTX_PARTY_ID, party_id)?;
                let id = client.create_email(party_id, &cmd).await?;
                Ok(Some(id))
            }
        })
    };

    SagaDefinition::builder(ADD_SAGA_NAME)
        .step(
            StepDefinition::new(STEP_ADD_NEW_EMAIL)
                .compensate(COMPENSATE_REMOVE_EMAIL)
                .event(EVENT_EMAIL_ADDED)
                .requires_input(),
            add,
        )
        .compensation(
            COMPENSATE_REMOVE_EMAIL,
            remove_compensation(client, ResourceKind::Email),
        )
}

pub fn remove_saga(client: &Arc<dyn CustomersClient>) -> SagaBuilder {
    let client = Arc::clone(client);
    let remove = step_fn(move |cmd: RemoveEmailCommand, _ctx: SagaContext| {
        let client = Arc::clone(&client);
        async move {
            client
                .delete(ResourceKind::Email, cmd.party_id, cmd.email_id)
                .await?;
            Ok(None::<()>)
        }
    });

    SagaDefinition::builder(REMOVE_SAGA_NAME).step(
        StepDefinition::new(STEP_REMOVE_NEW_EMAIL)
            .event(EVENT_EMAIL_REMOVED)
            .requires_input(),
        remove,
    )
}
