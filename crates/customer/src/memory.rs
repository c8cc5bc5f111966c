//! In-memory customer service for tests and local runs.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::client::{CustomersClient, PartyView, ResourceKind};
use crate::commands::{
    RegisterAddressCommand, RegisterConsentCommand, RegisterEconomicActivityLinkCommand,
    RegisterEmailCommand, RegisterIdentityDocumentCommand, RegisterLegalPersonCommand,
    RegisterNaturalPersonCommand, RegisterPartyCommand, RegisterPartyGroupMembershipCommand,
    RegisterPartyProviderCommand, RegisterPartyRelationshipCommand, RegisterPepCommand,
    RegisterPhoneCommand, RegisterStatusEntryCommand,
};
use crate::error::ClientError;

/// A stored resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: i64,
    pub kind: ResourceKind,
    pub party_id: i64,
    pub body: Value,
}

#[derive(Debug, Default)]
struct InMemoryCustomersState {
    next_id: i64,
    resources: BTreeMap<i64, Resource>,
    tax_ids: HashMap<String, i64>,
    calls: Vec<String>,
    deleted: Vec<(ResourceKind, i64)>,
    creates: HashMap<ResourceKind, usize>,
    fail_on: HashMap<ResourceKind, usize>,
    fail_with: HashMap<ResourceKind, ClientError>,
    fail_deletes: HashSet<ResourceKind>,
}

impl InMemoryCustomersState {
    fn check_party(&self, party_id: i64) -> Result<(), ClientError> {
        match self.resources.get(&party_id) {
            Some(r) if r.kind == ResourceKind::Party => Ok(()),
            _ => Err(ClientError::NotFound {
                kind: ResourceKind::Party,
                id: party_id,
            }),
        }
    }

    fn find(&self, kind: ResourceKind, party_id: i64, id: i64) -> Result<&Resource, ClientError> {
        self.resources
            .get(&id)
            .filter(|r| r.kind == kind && r.party_id == party_id)
            .ok_or(ClientError::NotFound { kind, id })
    }

    fn find_mut(
        &mut self,
        kind: ResourceKind,
        party_id: i64,
        id: i64,
    ) -> Result<&mut Resource, ClientError> {
        self.resources
            .get_mut(&id)
            .filter(|r| r.kind == kind && r.party_id == party_id)
            .ok_or(ClientError::NotFound { kind, id })
    }

    /// The single resource of `kind` owned by `party_id`.
    fn owned_by(&self, kind: ResourceKind, party_id: i64) -> Result<i64, ClientError> {
        self.resources
            .values()
            .find(|r| r.kind == kind && r.party_id == party_id)
            .map(|r| r.id)
            .ok_or(ClientError::NotFound { kind, id: party_id })
    }
}

/// In-memory customer service.
///
/// Identifiers are assigned sequentially across all resource kinds,
/// starting at 1. Every call is logged as `verb:kind:id` (for example
/// `create:address:3`).
#[derive(Debug, Clone, Default)]
pub struct InMemoryCustomersClient {
    state: Arc<RwLock<InMemoryCustomersState>>,
}

impl InMemoryCustomersClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, InMemoryCustomersState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, InMemoryCustomersState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the `nth` (1-based) create of `kind` fail as unavailable.
    pub fn fail_on(&self, kind: ResourceKind, nth: usize) {
        self.write().fail_on.insert(kind, nth);
    }

    /// Makes every create of `kind` fail with `error`.
    pub fn fail_with(&self, kind: ResourceKind, error: ClientError) {
        self.write().fail_with.insert(kind, error);
    }

    /// Makes every delete of `kind` fail as unavailable.
    pub fn fail_deletes(&self, kind: ResourceKind) {
        self.write().fail_deletes.insert(kind);
    }

    /// Removes all injected failures.
    pub fn clear_failures(&self) {
        let mut state = self.write();
        state.fail_on.clear();
        state.fail_with.clear();
        state.fail_deletes.clear();
    }

    /// Ids of the live resources of `kind`, in creation order.
    pub fn live(&self, kind: ResourceKind) -> Vec<i64> {
        self.read()
            .resources
            .values()
            .filter(|r| r.kind == kind)
            .map(|r| r.id)
            .collect()
    }

    /// Ids of the deleted resources of `kind`, in deletion order.
    pub fn deleted(&self, kind: ResourceKind) -> Vec<i64> {
        self.read()
            .deleted
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| *id)
            .collect()
    }

    pub fn resource(&self, id: i64) -> Option<Resource> {
        self.read().resources.get(&id).cloned()
    }

    /// Number of live resources of every kind.
    pub fn resource_count(&self) -> usize {
        self.read().resources.len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.read().calls.clone()
    }

    fn create<C: Serialize>(
        &self,
        kind: ResourceKind,
        party_id: Option<i64>,
        cmd: &C,
        tax_id: Option<&str>,
    ) -> Result<i64, ClientError> {
        let mut state = self.write();

        let count = state.creates.entry(kind).or_default();
        *count += 1;
        let attempt = *count;

        if let Some(err) = state.fail_with.get(&kind) {
            let err = err.clone();
            state.calls.push(format!("create:{kind}:failed"));
            return Err(err);
        }
        if state.fail_on.get(&kind) == Some(&attempt) {
            state.calls.push(format!("create:{kind}:failed"));
            return Err(ClientError::Unavailable(format!(
                "injected failure on {kind} #{attempt}"
            )));
        }
        if let Some(party_id) = party_id {
            state.check_party(party_id)?;
        }
        if let Some(tax_id) = tax_id
            && state.tax_ids.contains_key(tax_id)
        {
            return Err(ClientError::Conflict(format!(
                "tax identification number {tax_id} is already registered"
            )));
        }

        let body =
            serde_json::to_value(cmd).map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        state.next_id += 1;
        let id = state.next_id;
        if let Some(tax_id) = tax_id {
            state.tax_ids.insert(tax_id.to_string(), id);
        }
        state.resources.insert(
            id,
            Resource {
                id,
                kind,
                party_id: party_id.unwrap_or(id),
                body,
            },
        );
        state.calls.push(format!("create:{kind}:{id}"));
        tracing::debug!(kind = %kind, id, "Resource created");
        Ok(id)
    }
}

#[async_trait]
impl CustomersClient for InMemoryCustomersClient {
    async fn create_party(&self, cmd: &RegisterPartyCommand) -> Result<i64, ClientError> {
        self.create(ResourceKind::Party, None, cmd, None)
    }

    async fn create_natural_person(
        &self,
        party_id: i64,
        cmd: &RegisterNaturalPersonCommand,
    ) -> Result<i64, ClientError> {
        self.create(
            ResourceKind::NaturalPerson,
            Some(party_id),
            cmd,
            cmd.tax_identification_number.as_deref(),
        )
    }

    async fn create_legal_person(
        &self,
        party_id: i64,
        cmd: &RegisterLegalPersonCommand,
    ) -> Result<i64, ClientError> {
        self.create(
            ResourceKind::LegalPerson,
            Some(party_id),
            cmd,
            cmd.tax_identification_number.as_deref(),
        )
    }

    async fn create_status_entry(
        &self,
        party_id: i64,
        cmd: &RegisterStatusEntryCommand,
    ) -> Result<i64, ClientError> {
        self.create(ResourceKind::StatusEntry, Some(party_id), cmd, None)
    }

    async fn create_pep(
        &self,
        party_id: i64,
        cmd: &RegisterPepCommand,
    ) -> Result<i64, ClientError> {
        self.create(ResourceKind::Pep, Some(party_id), cmd, None)
    }

    async fn create_identity_document(
        &self,
        party_id: i64,
        cmd: &RegisterIdentityDocumentCommand,
    ) -> Result<i64, ClientError> {
        self.create(ResourceKind::IdentityDocument, Some(party_id), cmd, None)
    }

    async fn create_address(
        &self,
        party_id: i64,
        cmd: &RegisterAddressCommand,
    ) -> Result<i64, ClientError> {
        self.create(ResourceKind::Address, Some(party_id), cmd, None)
    }

    async fn create_email(
        &self,
        party_id: i64,
        cmd: &RegisterEmailCommand,
    ) -> Result<i64, ClientError> {
        self.create(ResourceKind::Email, Some(party_id), cmd, None)
    }

    async fn create_phone(
        &self,
        party_id: i64,
        cmd: &RegisterPhoneCommand,
    ) -> Result<i64, ClientError> {
        self.create(ResourceKind::Phone, Some(party_id), cmd, None)
    }

    async fn create_economic_activity_link(
        &self,
        party_id: i64,
        cmd: &RegisterEconomicActivityLinkCommand,
    ) -> Result<i64, ClientError> {
        self.create(ResourceKind::EconomicActivityLink, Some(party_id), cmd, None)
    }

    async fn create_consent(
        &self,
        party_id: i64,
        cmd: &RegisterConsentCommand,
    ) -> Result<i64, ClientError> {
        self.create(ResourceKind::Consent, Some(party_id), cmd, None)
    }

    async fn create_provider(
        &self,
        party_id: i64,
        cmd: &RegisterPartyProviderCommand,
    ) -> Result<i64, ClientError> {
        self.create(ResourceKind::Provider, Some(party_id), cmd, None)
    }

    async fn create_relationship(
        &self,
        party_id: i64,
        cmd: &RegisterPartyRelationshipCommand,
    ) -> Result<i64, ClientError> {
        self.create(ResourceKind::Relationship, Some(party_id), cmd, None)
    }

    async fn create_group_membership(
        &self,
        party_id: i64,
        cmd: &RegisterPartyGroupMembershipCommand,
    ) -> Result<i64, ClientError> {
        self.create(ResourceKind::GroupMembership, Some(party_id), cmd, None)
    }

    async fn delete(&self, kind: ResourceKind, party_id: i64, id: i64) -> Result<(), ClientError> {
        let mut state = self.write();
        if state.fail_deletes.contains(&kind) {
            state.calls.push(format!("delete:{kind}:failed"));
            return Err(ClientError::Unavailable(format!(
                "injected failure deleting {kind} {id}"
            )));
        }
        state.find(kind, party_id, id)?;
        state.resources.remove(&id);
        state.tax_ids.retain(|_, owner| *owner != id);
        state.deleted.push((kind, id));
        state.calls.push(format!("delete:{kind}:{id}"));
        tracing::debug!(kind = %kind, id, "Resource deleted");
        Ok(())
    }

    async fn get_party(&self, party_id: i64) -> Result<PartyView, ClientError> {
        let state = self.read();
        let party = state.find(ResourceKind::Party, party_id, party_id)?;
        let party_kind = party
            .body
            .get("partyKind")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let preferred_language = party
            .body
            .get("preferredLanguage")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(PartyView {
            party_id,
            party_kind,
            preferred_language,
        })
    }

    async fn get_natural_person(&self, party_id: i64) -> Result<i64, ClientError> {
        self.read().owned_by(ResourceKind::NaturalPerson, party_id)
    }

    async fn get_legal_person(&self, party_id: i64) -> Result<i64, ClientError> {
        self.read().owned_by(ResourceKind::LegalPerson, party_id)
    }

    async fn update_natural_person_name(
        &self,
        party_id: i64,
        natural_person_id: i64,
        new_name: &str,
    ) -> Result<i64, ClientError> {
        let mut state = self.write();
        let person = state.find_mut(ResourceKind::NaturalPerson, party_id, natural_person_id)?;
        person.body["firstName"] = Value::from(new_name);
        state
            .calls
            .push(format!("update:{}:{natural_person_id}", ResourceKind::NaturalPerson));
        Ok(natural_person_id)
    }

    async fn update_legal_person_name(
        &self,
        party_id: i64,
        legal_person_id: i64,
        new_name: &str,
    ) -> Result<i64, ClientError> {
        let mut state = self.write();
        let entity = state.find_mut(ResourceKind::LegalPerson, party_id, legal_person_id)?;
        entity.body["legalName"] = Value::from(new_name);
        state
            .calls
            .push(format!("update:{}:{legal_person_id}", ResourceKind::LegalPerson));
        Ok(legal_person_id)
    }

    async fn update_address(
        &self,
        party_id: i64,
        address_id: i64,
        cmd: &RegisterAddressCommand,
    ) -> Result<i64, ClientError> {
        let body =
            serde_json::to_value(cmd).map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        let mut state = self.write();
        state.find_mut(ResourceKind::Address, party_id, address_id)?.body = body;
        state
            .calls
            .push(format!("update:{}:{address_id}", ResourceKind::Address));
        Ok(address_id)
    }

    async fn set_primary_email(&self, party_id: i64, email_id: i64) -> Result<(), ClientError> {
        let mut state = self.write();
        state.find(ResourceKind::Email, party_id, email_id)?;
        for email in state
            .resources
            .values_mut()
            .filter(|r| r.kind == ResourceKind::Email && r.party_id == party_id)
        {
            email.body["isPrimary"] = Value::Bool(email.id == email_id);
        }
        state
            .calls
            .push(format!("update:{}:{email_id}", ResourceKind::Email));
        Ok(())
    }

    async fn set_primary_phone(&self, party_id: i64, phone_id: i64) -> Result<(), ClientError> {
        let mut state = self.write();
        state.find(ResourceKind::Phone, party_id, phone_id)?;
        for phone in state
            .resources
            .values_mut()
            .filter(|r| r.kind == ResourceKind::Phone && r.party_id == party_id)
        {
            phone.body["isPrimary"] = Value::Bool(phone.id == phone_id);
        }
        state
            .calls
            .push(format!("update:{}:{phone_id}", ResourceKind::Phone));
        Ok(())
    }

    async fn update_party_status(
        &self,
        party_id: i64,
        cmd: &RegisterStatusEntryCommand,
    ) -> Result<(), ClientError> {
        let mut state = self.write();
        state.check_party(party_id)?;
        if let Some(party) = state.resources.get_mut(&party_id) {
            party.body["status"] = Value::from(cmd.status_code.as_str());
        }
        state
            .calls
            .push(format!("update:{}:{party_id}", ResourceKind::Party));
        Ok(())
    }
}
