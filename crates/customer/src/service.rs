//! Command service: turns customer commands into saga executions.

use std::sync::Arc;

use saga::{
    EngineConfig, ExpandEach, SagaEngine, SagaResult, StepInputs, StepRegistry, ValidationError,
};

use crate::client::CustomersClient;
use crate::commands::{
    KIND_INDIVIDUAL, KIND_ORGANIZATION, PreferredChannelCommand, RegisterAddressCommand,
    RegisterCustomerCommand, RegisterEmailCommand, RegisterPhoneCommand,
    RegisterStatusEntryCommand, RemoveAddressCommand, RemoveEmailCommand, RemovePhoneCommand,
    UpdateNameCommand,
};
use crate::error::{CustomerError, Result};
use crate::orchestrator::{
    address, channel, email, phone, register_all, register_customer as reg, status, update_name,
};

const DORMANT_REASON: &str = "User has been marked as dormant due to inactivity";
const REACTIVATED_REASON: &str = "User account has been reactivated and is now fully usable.";
const DECEASED_REASON: &str = "User account is permanently closed because the user is deceased.";
const CLOSURE_REQUESTED_REASON: &str =
    "A closure request has been submitted but is not yet confirmed.";
const CLOSURE_CONFIRMED_REASON: &str =
    "Closure has been confirmed and the account is permanently closed.";
const LOCKED_REASON: &str = "Profile is temporarily locked, restricting access and activity.";
const UNLOCKED_REASON: &str = "Lock has been removed; user profile is restored to active status.";

/// Runs customer operations as sagas.
///
/// Every operation returns the [`SagaResult`]; a failed saga is a normal
/// result, not an error. Errors are reserved for commands that cannot be
/// started at all.
#[derive(Clone)]
pub struct CustomerCommandService {
    engine: Arc<SagaEngine>,
}

impl CustomerCommandService {
    pub fn new(engine: SagaEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Registers every customer saga against `client` and builds an engine
    /// with `config`.
    pub fn build(
        client: Arc<dyn CustomersClient>,
        config: EngineConfig,
    ) -> std::result::Result<Self, ValidationError> {
        let mut registry = StepRegistry::new();
        register_all(&mut registry, &client)?;
        Ok(Self::new(SagaEngine::new(Arc::new(registry), config)))
    }

    pub fn engine(&self) -> &SagaEngine {
        &self.engine
    }

    async fn run(&self, saga: &str, inputs: StepInputs) -> Result<SagaResult> {
        let result = self.engine.execute(saga, inputs).await?;
        if result.is_completed() {
            tracing::info!(saga, execution_id = %result.execution_id, "Customer operation completed");
        } else {
            tracing::warn!(
                saga,
                execution_id = %result.execution_id,
                status = %result.status,
                "Customer operation failed"
            );
        }
        Ok(result)
    }

    /// Registers a customer with all its sub-resources.
    #[tracing::instrument(skip(self, cmd), fields(party_kind = %cmd.party.party_kind))]
    pub async fn register(&self, cmd: RegisterCustomerCommand) -> Result<SagaResult> {
        let kind = cmd.party.party_kind.as_str();
        if kind != KIND_INDIVIDUAL && kind != KIND_ORGANIZATION {
            return Err(CustomerError::InvalidCommand(format!(
                "unknown party kind '{kind}'"
            )));
        }

        let inputs = StepInputs::builder()
            .for_step(reg::STEP_REGISTER_PARTY, cmd.party)
            .for_step_opt(reg::STEP_REGISTER_NATURAL_PERSON, cmd.natural_person)
            .for_step_opt(reg::STEP_REGISTER_LEGAL_PERSON, cmd.legal_person)
            .for_step_expanded(
                reg::STEP_REGISTER_STATUS_ENTRY,
                ExpandEach::of(cmd.status_history),
            )
            .for_step_opt(reg::STEP_REGISTER_PEP, cmd.pep)
            .for_step_expanded(
                reg::STEP_REGISTER_IDENTITY_DOCUMENT,
                ExpandEach::of(cmd.identity_documents),
            )
            .for_step_expanded(reg::STEP_REGISTER_ADDRESS, ExpandEach::of(cmd.addresses))
            .for_step_expanded(reg::STEP_REGISTER_EMAIL, ExpandEach::of(cmd.emails))
            .for_step_expanded(reg::STEP_REGISTER_PHONE, ExpandEach::of(cmd.phones))
            .for_step_expanded(
                reg::STEP_REGISTER_ECONOMIC_ACTIVITY_LINK,
                ExpandEach::of(cmd.economic_activities),
            )
            .for_step_expanded(reg::STEP_REGISTER_CONSENT, ExpandEach::of(cmd.consents))
            .for_step_expanded(
                reg::STEP_REGISTER_PARTY_PROVIDER,
                ExpandEach::of(cmd.providers),
            )
            .for_step_expanded(
                reg::STEP_REGISTER_PARTY_RELATIONSHIP,
                ExpandEach::of(cmd.relationships),
            )
            .for_step_expanded(
                reg::STEP_REGISTER_PARTY_GROUP_MEMBERSHIP,
                ExpandEach::of(cmd.group_memberships),
            )
            .build()?;

        self.run(reg::SAGA_NAME, inputs).await
    }

    #[tracing::instrument(skip(self, cmd), fields(party_id = cmd.party_id))]
    pub async fn update_name(&self, cmd: UpdateNameCommand) -> Result<SagaResult> {
        let inputs = StepInputs::builder()
            .for_step(update_name::STEP_RETRIEVE_PARTY_ID, &cmd)
            .for_step(update_name::STEP_UPDATE_NAME, &cmd)
            .build()?;
        self.run(update_name::SAGA_NAME, inputs).await
    }

    #[tracing::instrument(skip(self, cmd))]
    pub async fn add_address(
        &self,
        party_id: i64,
        cmd: RegisterAddressCommand,
    ) -> Result<SagaResult> {
        let inputs = StepInputs::builder()
            .for_step(address::STEP_ADD_NEW_ADDRESS, cmd.with_party_id(party_id))
            .build()?;
        self.run(address::ADD_SAGA_NAME, inputs).await
    }

    #[tracing::instrument(skip(self, cmd))]
    pub async fn update_address(
        &self,
        party_id: i64,
        address_id: i64,
        cmd: RegisterAddressCommand,
    ) -> Result<SagaResult> {
        let cmd = cmd.with_party_id(party_id).with_address_id(address_id);
        let inputs = StepInputs::builder()
            .for_step(address::STEP_UPDATE_ADDRESS, cmd)
            .build()?;
        self.run(address::UPDATE_SAGA_NAME, inputs).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_address(&self, party_id: i64, address_id: i64) -> Result<SagaResult> {
        let inputs = StepInputs::builder()
            .for_step(
                address::STEP_REMOVE_NEW_ADDRESS,
                RemoveAddressCommand {
                    party_id,
                    address_id,
                },
            )
            .build()?;
        self.run(address::REMOVE_SAGA_NAME, inputs).await
    }

    #[tracing::instrument(skip(self, cmd))]
    pub async fn add_email(&self, party_id: i64, cmd: RegisterEmailCommand) -> Result<SagaResult> {
        let inputs = StepInputs::builder()
            .for_step(email::STEP_ADD_NEW_EMAIL, cmd.with_party_id(party_id))
            .build()?;
        self.run(email::ADD_SAGA_NAME, inputs).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_email(&self, party_id: i64, email_id: i64) -> Result<SagaResult> {
        let inputs = StepInputs::builder()
            .for_step(
                email::STEP_REMOVE_NEW_EMAIL,
                RemoveEmailCommand { party_id, email_id },
            )
            .build()?;
        self.run(email::REMOVE_SAGA_NAME, inputs).await
    }

    #[tracing::instrument(skip(self, cmd))]
    pub async fn add_phone(&self, party_id: i64, cmd: RegisterPhoneCommand) -> Result<SagaResult> {
        let inputs = StepInputs::builder()
            .for_step(phone::STEP_ADD_NEW_PHONE, cmd.with_party_id(party_id))
            .build()?;
        self.run(phone::ADD_SAGA_NAME, inputs).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_phone(&self, party_id: i64, phone_id: i64) -> Result<SagaResult> {
        let inputs = StepInputs::builder()
            .for_step(
                phone::STEP_REMOVE_NEW_PHONE,
                RemovePhoneCommand { party_id, phone_id },
            )
            .build()?;
        self.run(phone::REMOVE_SAGA_NAME, inputs).await
    }

    #[tracing::instrument(skip(self, cmd))]
    pub async fn set_preferred_channel(
        &self,
        party_id: i64,
        cmd: PreferredChannelCommand,
    ) -> Result<SagaResult> {
        let inputs = StepInputs::builder()
            .for_step(channel::STEP_UPDATE_CHANNEL, cmd.with_party_id(party_id))
            .build()?;
        self.run(channel::SAGA_NAME, inputs).await
    }

    async fn update_status(&self, party_id: i64, code: &str, reason: &str) -> Result<SagaResult> {
        let cmd = RegisterStatusEntryCommand::new(code, reason).with_party_id(party_id);
        let inputs = StepInputs::builder()
            .for_step(status::STEP_UPDATE_STATUS, cmd)
            .build()?;
        self.run(status::SAGA_NAME, inputs).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn mark_dormant(&self, party_id: i64) -> Result<SagaResult> {
        self.update_status(party_id, status::STATUS_INACTIVE, DORMANT_REASON)
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn reactivate(&self, party_id: i64) -> Result<SagaResult> {
        self.update_status(party_id, status::STATUS_ACTIVE, REACTIVATED_REASON)
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn mark_deceased(&self, party_id: i64) -> Result<SagaResult> {
        self.update_status(party_id, status::STATUS_CLOSED, DECEASED_REASON)
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn request_closure(&self, party_id: i64) -> Result<SagaResult> {
        self.update_status(party_id, status::STATUS_PENDING, CLOSURE_REQUESTED_REASON)
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn confirm_closure(&self, party_id: i64) -> Result<SagaResult> {
        self.update_status(party_id, status::STATUS_CLOSED, CLOSURE_CONFIRMED_REASON)
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn lock_profile(&self, party_id: i64) -> Result<SagaResult> {
        self.update_status(party_id, status::STATUS_SUSPENDED, LOCKED_REASON)
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn unlock_profile(&self, party_id: i64) -> Result<SagaResult> {
        self.update_status(party_id, status::STATUS_ACTIVE, UNLOCKED_REASON)
            .await
    }
}
