//! Preferred contact channel.

use std::sync::Arc;

use saga::{SagaBuilder, SagaContext, SagaDefinition, StepDefinition, StepError, step_fn};

use crate::client::CustomersClient;
use crate::commands::PreferredChannelCommand;

pub const SAGA_NAME: &str = "SetPreferredChannelSaga";

pub const STEP_UPDATE_CHANNEL: &str = "updateChannel";

pub const EVENT_PREFERRED_CHANNEL_UPDATED: &str = "preferredChannel.updated";

pub fn saga(client: &Arc<dyn CustomersClient>) -> SagaBuilder {
    let client = Arc::clone(client);
    let update = step_fn(move |cmd: PreferredChannelCommand, _ctx: SagaContext| {
        let client = Arc::clone(&client);
        async move {
            let party_id = cmd
                .party_id
                .ok_or_else(|| StepError::invalid_input("channel command has no party id"))?;

            // Email and phone are independent; both updates run at once.
            let email = async {
                match cmd.email_id {
                    Some(id) => client.set_primary_email(party_id, id).await,
                    None => Ok(()),
                }
            };
            let phone = async {
                match cmd.phone_id {
                    Some(id) => client.set_primary_phone(party_id, id).await,
                    None => Ok(()),
                }
            };
            tokio::try_join!(email, phone)?;
            Ok(None::<()>)
        }
    });

    SagaDefinition::builder(SAGA_NAME).step(
        StepDefinition::new(STEP_UPDATE_CHANNEL)
            .event(EVENT_PREFERRED_CHANNEL_UPDATED)
            .requires_input(),
        update,
    )
}
