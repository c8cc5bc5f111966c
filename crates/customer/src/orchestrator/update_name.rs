//! Renaming a customer.
//!
//! The party view fetched by the first step decides whether the natural
//! person or the legal entity record is renamed.

use std::sync::Arc;

use saga::{SagaBuilder, SagaContext, SagaDefinition, StepDefinition, StepError, step_fn};

use super::{CTX_CUSTOMER_ID, CTX_PARTY_ID};
use crate::client::{CustomersClient, PartyView};
use crate::commands::{KIND_INDIVIDUAL, KIND_ORGANIZATION, UpdateNameCommand};

pub const SAGA_NAME: &str = "UpdateNameSaga";

pub const STEP_RETRIEVE_PARTY_ID: &str = "retrievePartyId";
pub const STEP_RETRIEVE_CUSTOMER: &str = "retrieveCustomer";
pub const STEP_UPDATE_NAME: &str = "updateName";

pub const EVENT_PARTY_RETRIEVED: &str = "party.retrieved";
pub const EVENT_CUSTOMER_RETRIEVED: &str = "customer.retrieved";
pub const EVENT_CUSTOMER_NAME_CHANGED: &str = "customername.changed";

fn party_view(ctx: &SagaContext) -> Result<PartyView, StepError> {
    ctx.step_output(STEP_RETRIEVE_PARTY_ID)
        .ok_or_else(|| StepError::internal("party view was not recorded"))
}

fn unsupported(kind: &str) -> StepError {
    StepError::invalid_input(format!("Unsupported party kind: {kind}"))
}

pub fn saga(client: &Arc<dyn CustomersClient>) -> SagaBuilder {
    let retrieve_party = {
        let client = Arc::clone(client);
        step_fn(move |cmd: UpdateNameCommand, ctx: SagaContext| {
            let client = Arc::clone(&client);
            async move {
                let view = client.get_party(cmd.party_id).await?;
                ctx.put(&CTX_PARTY_ID, view.party_id)?;
                Ok(Some(view))
            }
        })
    };

    let retrieve_customer = {
        let client = Arc::clone(client);
        step_fn(move |(): (), ctx: SagaContext| {
            let client = Arc::clone(&client);
            async move {
                let view = party_view(&ctx)?;
                let customer_id = match view.party_kind.as_str() {
                    KIND_INDIVIDUAL => client.get_natural_person(view.party_id).await?,
                    KIND_ORGANIZATION => client.get_legal_person(view.party_id).await?,
                    other => return Err(unsupported(other)),
                };
                ctx.put(&CTX_CUSTOMER_ID, customer_id)?;
                Ok(Some(customer_id))
            }
        })
    };

    let update_name = {
        let client = Arc::clone(client);
        step_fn(move |cmd: UpdateNameCommand, ctx: SagaContext| {
            let client = Arc::clone(&client);
            async move {
                let view = party_view(&ctx)?;
                let customer_id = ctx.require(&CTX_CUSTOMER_ID)?;
                let id = match view.party_kind.as_str() {
                    KIND_INDIVIDUAL => {
                        client
                            .update_natural_person_name(cmd.party_id, customer_id, &cmd.new_name)
                            .await?
                    }
                    KIND_ORGANIZATION => {
                        client
                            .update_legal_person_name(cmd.party_id, customer_id, &cmd.new_name)
                            .await?
                    }
                    other => return Err(unsupported(other)),
                };
                Ok(Some(id))
            }
        })
    };

    SagaDefinition::builder(SAGA_NAME)
        .step(
            StepDefinition::new(STEP_RETRIEVE_PARTY_ID).event(EVENT_PARTY_RETRIEVED),
            retrieve_party,
        )
        .step(
            StepDefinition::new(STEP_RETRIEVE_CUSTOMER)
                .depends_on([STEP_RETRIEVE_PARTY_ID])
                .event(EVENT_CUSTOMER_RETRIEVED),
            retrieve_customer,
        )
        .step(
            StepDefinition::new(STEP_UPDATE_NAME)
                .depends_on([STEP_RETRIEVE_CUSTOMER])
                .event(EVENT_CUSTOMER_NAME_CHANGED),
            update_name,
        )
}
