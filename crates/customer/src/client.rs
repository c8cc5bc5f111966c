//! Downstream customer-management service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::commands::{
    RegisterAddressCommand, RegisterConsentCommand, RegisterEconomicActivityLinkCommand,
    RegisterEmailCommand, RegisterIdentityDocumentCommand, RegisterLegalPersonCommand,
    RegisterNaturalPersonCommand, RegisterPartyCommand, RegisterPartyGroupMembershipCommand,
    RegisterPartyProviderCommand, RegisterPartyRelationshipCommand, RegisterPepCommand,
    RegisterPhoneCommand, RegisterStatusEntryCommand,
};
use crate::error::ClientError;

/// Resource types managed by the customer service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Party,
    NaturalPerson,
    LegalPerson,
    StatusEntry,
    Pep,
    IdentityDocument,
    Address,
    Email,
    Phone,
    EconomicActivityLink,
    Consent,
    Provider,
    Relationship,
    GroupMembership,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Party => "party",
            ResourceKind::NaturalPerson => "natural person",
            ResourceKind::LegalPerson => "legal person",
            ResourceKind::StatusEntry => "status entry",
            ResourceKind::Pep => "pep",
            ResourceKind::IdentityDocument => "identity document",
            ResourceKind::Address => "address",
            ResourceKind::Email => "email",
            ResourceKind::Phone => "phone",
            ResourceKind::EconomicActivityLink => "economic activity link",
            ResourceKind::Consent => "consent",
            ResourceKind::Provider => "provider",
            ResourceKind::Relationship => "relationship",
            ResourceKind::GroupMembership => "group membership",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Summary of a party as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyView {
    pub party_id: i64,
    pub party_kind: String,
    pub preferred_language: Option<String>,
}

/// Operations the customer sagas perform against the service.
///
/// Every `create_*` returns the identifier the service assigned.
#[async_trait]
pub trait CustomersClient: Send + Sync {
    async fn create_party(&self, cmd: &RegisterPartyCommand) -> Result<i64, ClientError>;

    async fn create_natural_person(
        &self,
        party_id: i64,
        cmd: &RegisterNaturalPersonCommand,
    ) -> Result<i64, ClientError>;

    async fn create_legal_person(
        &self,
        party_id: i64,
        cmd: &RegisterLegalPersonCommand,
    ) -> Result<i64, ClientError>;

    async fn create_status_entry(
        &self,
        party_id: i64,
        cmd: &RegisterStatusEntryCommand,
    ) -> Result<i64, ClientError>;

    async fn create_pep(&self, party_id: i64, cmd: &RegisterPepCommand)
    -> Result<i64, ClientError>;

    async fn create_identity_document(
        &self,
        party_id: i64,
        cmd: &RegisterIdentityDocumentCommand,
    ) -> Result<i64, ClientError>;

    async fn create_address(
        &self,
        party_id: i64,
        cmd: &RegisterAddressCommand,
    ) -> Result<i64, ClientError>;

    async fn create_email(
        &self,
        party_id: i64,
        cmd: &RegisterEmailCommand,
    ) -> Result<i64, ClientError>;

    async fn create_phone(
        &self,
        party_id: i64,
        cmd: &RegisterPhoneCommand,
    ) -> Result<i64, ClientError>;

    async fn create_economic_activity_link(
        &self,
        party_id: i64,
        cmd: &RegisterEconomicActivityLinkCommand,
    ) -> Result<i64, ClientError>;

    async fn create_consent(
        &self,
        party_id: i64,
        cmd: &RegisterConsentCommand,
    ) -> Result<i64, ClientError>;

    async fn create_provider(
        &self,
        party_id: i64,
        cmd: &RegisterPartyProviderCommand,
    ) -> Result<i64, ClientError>;

    async fn create_relationship(
        &self,
        party_id: i64,
        cmd: &RegisterPartyRelationshipCommand,
    ) -> Result<i64, ClientError>;

    async fn create_group_membership(
        &self,
        party_id: i64,
        cmd: &RegisterPartyGroupMembershipCommand,
    ) -> Result<i64, ClientError>;

    /// Deletes one resource. For [`ResourceKind::Party`] `id` equals `party_id`.
    async fn delete(&self, kind: ResourceKind, party_id: i64, id: i64)
    -> Result<(), ClientError>;

    async fn get_party(&self, party_id: i64) -> Result<PartyView, ClientError>;

    /// Returns the id of the party's natural-person record.
    async fn get_natural_person(&self, party_id: i64) -> Result<i64, ClientError>;

    /// Returns the id of the party's legal-entity record.
    async fn get_legal_person(&self, party_id: i64) -> Result<i64, ClientError>;

    async fn update_natural_person_name(
        &self,
        party_id: i64,
        natural_person_id: i64,
        new_name: &str,
    ) -> Result<i64, ClientError>;

    async fn update_legal_person_name(
        &self,
        party_id: i64,
        legal_person_id: i64,
        new_name: &str,
    ) -> Result<i64, ClientError>;

    async fn update_address(
        &self,
        party_id: i64,
        address_id: i64,
        cmd: &RegisterAddressCommand,
    ) -> Result<i64, ClientError>;

    /// Marks an email as the party's primary one.
    async fn set_primary_email(&self, party_id: i64, email_id: i64) -> Result<(), ClientError>;

    /// Marks a phone as the party's primary one.
    async fn set_primary_phone(&self, party_id: i64, phone_id: i64) -> Result<(), ClientError>;

    async fn update_party_status(
        &self,
        party_id: i64,
        cmd: &RegisterStatusEntryCommand,
    ) -> Result<(), ClientError>;
}
