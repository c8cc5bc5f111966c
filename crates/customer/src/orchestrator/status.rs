//! Party status transitions.

use std::sync::Arc;

use saga::{SagaBuilder, SagaContext, SagaDefinition, StepDefinition, StepError, step_fn};

use crate::client::CustomersClient;
use crate::commands::RegisterStatusEntryCommand;

pub const SAGA_NAME: &str = "UpdateStatusSaga";

pub const STEP_UPDATE_STATUS: &str = "updateStatus";

pub const EVENT_STATUS_UPDATED: &str = "status.updated";

pub const STATUS_ACTIVE: &str = "ACTIVE";
pub const STATUS_INACTIVE: &str = "INACTIVE";
pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_SUSPENDED: &str = "SUSPENDED";
pub const STATUS_CLOSED: &str = "CLOSED";

pub fn saga(client: &Arc<dyn CustomersClient>) -> SagaBuilder {
    let client = Arc::clone(client);
    let update = step_fn(move |cmd: RegisterStatusEntryCommand, _ctx: SagaContext| {
        let client = Arc::clone(&client);
        async move {
            let party_id = cmd
                .party_id
                .ok_or_else(|| StepError::invalid_input("status command has no party id"))?;
            client.update_party_status(party_id, &cmd).await?;
            tracing::info!(party_id, status = %cmd.status_code, "Party status updated");
            Ok(Some(cmd.status_code))
        }
    });

    SagaDefinition::builder(SAGA_NAME).step(
        StepDefinition::new(STEP_UPDATE_STATUS)
            .event(EVENT_STATUS_UPDATED)
            .requires_input(),
        update,
    )
}
