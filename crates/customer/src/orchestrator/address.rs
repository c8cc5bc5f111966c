//! Single-address sagas.

use std::sync::Arc;

use saga::{SagaBuilder, SagaContext, SagaDefinition, StepDefinition, StepError, step_fn};

use super::{CTX_PARTY_ID, remove_compensation};
use crate::client::{CustomersClient, ResourceKind};
use crate::commands::{RegisterAddressCommand, RemoveAddressCommand};

pub const ADD_SAGA_NAME: &str = "AddAddressSaga";
pub const UPDATE_SAGA_NAME: &str = "UpdateAddressSaga";
pub const REMOVE_SAGA_NAME: &str = "RemoveAddressSaga";

pub const STEP_ADD_NEW_ADDRESS: &str = "addNewAddress";
pub const STEP_UPDATE_ADDRESS: &str = "updateAddress";
pub const STEP_REMOVE_NEW_ADDRESS: &str = "removeNewAddress";

pub const COMPENSATE_REMOVE_ADDRESS: &str = "removeAddress";

pub const EVENT_ADDRESS_ADDED: &str = "address.added";
pub const EVENT_ADDRESS_UPDATED: &str = "address.updated";
pub const EVENT_ADDRESS_REMOVED: &str = "address.removed";

fn party_of(cmd: &RegisterAddressCommand) -> Result<i64, StepError> {
    cmd.party_id
        .ok_or_else(|| StepError::invalid_input("address command has no party id"))
}

pub fn add_saga(client: &Arc<dyn CustomersClient>) -> SagaBuilder {
    let add = {
        let client = Arc::clone(client);
        step_fn(move |cmd: RegisterAddressCommand, ctx: SagaContext| {
            let client = Arc::clone(&client);
            async move {
                let party_id = party_of(&cmd)?;
                ctx.put(&CTX_PARTY_ID, party_id)?;
                let id = client.create_address(party_id, &cmd).await?;
                Ok(Some(id))
            }
        })
    };

    SagaDefinition::builder(ADD_SAGA_NAME)
        .step(
            StepDefinition::new(STEP_ADD_NEW_ADDRESS)
                .compensate(COMPENSATE_REMOVE_ADDRESS)
                .event(EVENT_ADDRESS_ADDED)
                .requires_input(),
            add,
        )
        .compensation(
            COMPENSATE_REMOVE_ADDRESS,
            remove_compensation(client, ResourceKind::Address),
        )
}

pub fn update_saga(client: &Arc<dyn CustomersClient>) -> SagaBuilder {
    let client = Arc::clone(client);
    let update = step_fn(move |cmd: RegisterAddressCommand, _ctx: SagaContext| {
        let client = Arc::clone(&client);
        async move {
            let party_id = party_of(&cmd)?;
            let address_id = cmd
                .address_id
                .ok_or_else(|| StepError::invalid_input("address command has no address id"))?;
            let id = client.update_address(party_id, address_id, &cmd).await?;
            Ok(Some(id))
        }
    });

    SagaDefinition::builder(UPDATE_SAGA_NAME).step(
        StepDefinition::new(STEP_UPDATE_ADDRESS)
            .event(EVENT_ADDRESS_UPDATED)
            .requires_input(),
        update,
    )
}

pub fn remove_saga(client: &Arc<dyn CustomersClient>) -> SagaBuilder {
    let client = Arc::clone(client);
    let remove = step_fn(move |cmd: RemoveAddressCommand, _ctx: SagaContext| {
        let client = Arc::clone(&client);
        async move {
            client
                .delete(ResourceKind::Address, cmd.party_id, cmd.address_id)
                .await?;
            Ok(None::<()>)
        }
    });

    SagaDefinition::builder(REMOVE_SAGA_NAME).step(
        StepDefinition::new(STEP_REMOVE_NEW_ADDRESS)
            .event(EVENT_ADDRESS_REMOVED)
            .requires_input(),
        remove,
    )
}
