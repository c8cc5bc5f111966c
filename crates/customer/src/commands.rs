//! Customer commands.
//!
//! Field names serialize in camelCase so the HTTP layer can accept them
//! directly.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Party kind of a natural person.
pub const KIND_INDIVIDUAL: &str = "INDIVIDUAL";
/// Party kind of a legal entity.
pub const KIND_ORGANIZATION: &str = "ORGANIZATION";

/// The party every other registration hangs off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPartyCommand {
    /// `INDIVIDUAL` or `ORGANIZATION`.
    pub party_kind: String,
    pub preferred_language: Option<String>,
    pub record_source: Option<String>,
}

impl RegisterPartyCommand {
    pub fn individual() -> Self {
        Self {
            party_kind: KIND_INDIVIDUAL.to_string(),
            preferred_language: None,
            record_source: None,
        }
    }

    pub fn organization() -> Self {
        Self {
            party_kind: KIND_ORGANIZATION.to_string(),
            preferred_language: None,
            record_source: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterNaturalPersonCommand {
    pub first_name: String,
    pub middle_name: Option<String>,
    pub first_surname: String,
    pub second_surname: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub place_of_birth: Option<String>,
    pub gender: Option<String>,
    pub marital_status: Option<String>,
    pub tax_identification_number: Option<String>,
    pub residency_status: Option<String>,
    pub title_id: Option<i64>,
    pub nationality_id: Option<i64>,
    pub country_of_residence_id: Option<i64>,
    pub avatar_url: Option<String>,
}

impl RegisterNaturalPersonCommand {
    pub fn new(first_name: impl Into<String>, first_surname: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            first_surname: first_surname.into(),
            ..Self::default()
        }
    }

    /// Full display name, skipping absent parts.
    pub fn full_name(&self) -> String {
        [
            Some(self.first_name.as_str()),
            self.middle_name.as_deref(),
            Some(self.first_surname.as_str()),
            self.second_surname.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterLegalPersonCommand {
    pub legal_name: String,
    pub trade_name: Option<String>,
    pub registration_number: Option<String>,
    pub tax_identification_number: Option<String>,
    pub legal_form_id: Option<i64>,
    pub date_of_incorporation: Option<NaiveDate>,
    pub business_activity: Option<String>,
    pub number_of_employees: Option<u32>,
    pub share_capital: Option<f64>,
    pub website_url: Option<String>,
    pub incorporation_country: Option<i64>,
    pub phone_number: Option<String>,
    pub email_address: Option<String>,
    pub main_contact_name: Option<String>,
    pub main_contact_title: Option<String>,
    pub logo_url: Option<String>,
}

impl RegisterLegalPersonCommand {
    pub fn new(legal_name: impl Into<String>) -> Self {
        Self {
            legal_name: legal_name.into(),
            ..Self::default()
        }
    }
}

/// One entry of a party's status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterStatusEntryCommand {
    pub party_id: Option<i64>,
    pub status_code: String,
    pub status_reason: Option<String>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
}

impl RegisterStatusEntryCommand {
    pub fn new(status_code: impl Into<String>, status_reason: impl Into<String>) -> Self {
        Self {
            party_id: None,
            status_code: status_code.into(),
            status_reason: Some(status_reason.into()),
            valid_from: Utc::now(),
            valid_to: None,
        }
    }

    pub fn with_party_id(mut self, party_id: i64) -> Self {
        self.party_id = Some(party_id);
        self
    }
}

/// Politically exposed person flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterPepCommand {
    pub pep: bool,
    pub category: Option<String>,
    pub public_position: Option<String>,
    pub country_of_position_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterIdentityDocumentCommand {
    pub identity_document_category_id: Option<i64>,
    pub identity_document_type_id: Option<i64>,
    pub document_number: String,
    pub issuing_country_id: Option<i64>,
    pub issue_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub issuing_authority: Option<String>,
    pub validated: bool,
    pub document_uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterAddressCommand {
    pub address_id: Option<i64>,
    pub party_id: Option<i64>,
    pub address_kind: Option<String>,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country_id: Option<i64>,
    pub is_primary: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl RegisterAddressCommand {
    pub fn new(line1: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            line1: line1.into(),
            city: city.into(),
            ..Self::default()
        }
    }

    pub fn with_party_id(mut self, party_id: i64) -> Self {
        self.party_id = Some(party_id);
        self
    }

    pub fn with_address_id(mut self, address_id: i64) -> Self {
        self.address_id = Some(address_id);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterEmailCommand {
    pub party_id: Option<i64>,
    pub email: String,
    pub email_kind: Option<String>,
    pub is_primary: bool,
    pub is_verified: bool,
}

impl RegisterEmailCommand {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }

    pub fn with_party_id(mut self, party_id: i64) -> Self {
        self.party_id = Some(party_id);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterPhoneCommand {
    pub party_id: Option<i64>,
    pub phone_number: String,
    pub phone_kind: Option<String>,
    pub is_primary: bool,
    pub is_verified: bool,
    pub extension: Option<String>,
}

impl RegisterPhoneCommand {
    pub fn new(phone_number: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            ..Self::default()
        }
    }

    pub fn with_party_id(mut self, party_id: i64) -> Self {
        self.party_id = Some(party_id);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterEconomicActivityLinkCommand {
    pub economic_activity_id: i64,
    pub annual_turnover: Option<f64>,
    pub currency_code: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_primary: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterConsentCommand {
    pub consent_type_id: i64,
    pub granted: bool,
    pub granted_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub channel: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterPartyProviderCommand {
    pub provider_name: String,
    pub external_reference: Option<String>,
    pub provider_status: Option<String>,
    pub last_sync_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterPartyRelationshipCommand {
    pub to_party_id: i64,
    pub relationship_type_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub active: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterPartyGroupMembershipCommand {
    pub group_id: i64,
    pub is_active: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Everything needed to register one customer.
///
/// Exactly one of `natural_person` / `legal_person` is expected, matching
/// `party.party_kind`; the other is ignored. List fields may be empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCustomerCommand {
    pub party: RegisterPartyCommand,
    #[serde(default)]
    pub natural_person: Option<RegisterNaturalPersonCommand>,
    #[serde(default)]
    pub legal_person: Option<RegisterLegalPersonCommand>,
    #[serde(default)]
    pub status_history: Vec<RegisterStatusEntryCommand>,
    #[serde(default)]
    pub pep: Option<RegisterPepCommand>,
    #[serde(default)]
    pub identity_documents: Vec<RegisterIdentityDocumentCommand>,
    #[serde(default)]
    pub addresses: Vec<RegisterAddressCommand>,
    #[serde(default)]
    pub emails: Vec<RegisterEmailCommand>,
    #[serde(default)]
    pub phones: Vec<RegisterPhoneCommand>,
    #[serde(default)]
    pub economic_activities: Vec<RegisterEconomicActivityLinkCommand>,
    #[serde(default)]
    pub consents: Vec<RegisterConsentCommand>,
    #[serde(default)]
    pub providers: Vec<RegisterPartyProviderCommand>,
    #[serde(default)]
    pub relationships: Vec<RegisterPartyRelationshipCommand>,
    #[serde(default)]
    pub group_memberships: Vec<RegisterPartyGroupMembershipCommand>,
}

impl RegisterCustomerCommand {
    /// A natural-person registration with no sub-resources.
    pub fn individual(person: RegisterNaturalPersonCommand) -> Self {
        Self::empty(RegisterPartyCommand::individual(), Some(person), None)
    }

    /// A legal-entity registration with no sub-resources.
    pub fn organization(entity: RegisterLegalPersonCommand) -> Self {
        Self::empty(RegisterPartyCommand::organization(), None, Some(entity))
    }

    fn empty(
        party: RegisterPartyCommand,
        natural_person: Option<RegisterNaturalPersonCommand>,
        legal_person: Option<RegisterLegalPersonCommand>,
    ) -> Self {
        Self {
            party,
            natural_person,
            legal_person,
            status_history: Vec::new(),
            pep: None,
            identity_documents: Vec::new(),
            addresses: Vec::new(),
            emails: Vec::new(),
            phones: Vec::new(),
            economic_activities: Vec::new(),
            consents: Vec::new(),
            providers: Vec::new(),
            relationships: Vec::new(),
            group_memberships: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNameCommand {
    pub party_id: i64,
    pub new_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveAddressCommand {
    pub party_id: i64,
    pub address_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveEmailCommand {
    pub party_id: i64,
    pub email_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovePhoneCommand {
    pub party_id: i64,
    pub phone_id: i64,
}

/// Marks an email and/or phone as the party's preferred contact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferredChannelCommand {
    pub party_id: Option<i64>,
    pub email_id: Option<i64>,
    pub phone_id: Option<i64>,
}

impl PreferredChannelCommand {
    pub fn with_party_id(mut self, party_id: i64) -> Self {
        self.party_id = Some(party_id);
        self
    }
}
