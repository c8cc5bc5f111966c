//! Customer registration.
//!
//! `registerParty` creates the party and records its id and kind in the
//! context. Every other step depends only on it: the person/entity record
//! matching the party kind, then the lists of sub-resources, each fanned
//! out one element at a time so that a failure leaves only the elements
//! before it to undo.

use std::sync::Arc;

use saga::{SagaBuilder, SagaContext, SagaDefinition, StepDefinition, step_fn};

use super::{CTX_CUSTOMER_TYPE, CTX_PARTY_ID, create_step, remove_compensation};
use crate::client::{CustomersClient, ResourceKind};
use crate::commands::{
    KIND_INDIVIDUAL, KIND_ORGANIZATION, RegisterAddressCommand, RegisterConsentCommand,
    RegisterEconomicActivityLinkCommand, RegisterEmailCommand, RegisterIdentityDocumentCommand,
    RegisterLegalPersonCommand, RegisterNaturalPersonCommand, RegisterPartyCommand,
    RegisterPartyGroupMembershipCommand, RegisterPartyProviderCommand,
    RegisterPartyRelationshipCommand, RegisterPepCommand, RegisterPhoneCommand,
    RegisterStatusEntryCommand,
};

pub const SAGA_NAME: &str = "RegisterCustomerSaga";

pub const STEP_REGISTER_PARTY: &str = "registerParty";
pub const STEP_REGISTER_NATURAL_PERSON: &str = "registerNaturalPerson";
pub const STEP_REGISTER_LEGAL_PERSON: &str = "registerLegalPerson";
pub const STEP_REGISTER_STATUS_ENTRY: &str = "registerStatusEntry";
pub const STEP_REGISTER_PEP: &str = "registerPep";
pub const STEP_REGISTER_IDENTITY_DOCUMENT: &str = "registerIdentityDocument";
pub const STEP_REGISTER_ADDRESS: &str = "registerAddress";
pub const STEP_REGISTER_EMAIL: &str = "registerEmail";
pub const STEP_REGISTER_PHONE: &str = "registerPhone";
pub const STEP_REGISTER_ECONOMIC_ACTIVITY_LINK: &str = "registerEconomicActivityLink";
pub const STEP_REGISTER_CONSENT: &str = "registerConsent";
pub const STEP_REGISTER_PARTY_PROVIDER: &str = "registerPartyProvider";
pub const STEP_REGISTER_PARTY_RELATIONSHIP: &str = "registerPartyRelationship";
pub const STEP_REGISTER_PARTY_GROUP_MEMBERSHIP: &str = "registerPartyGroupMembership";

pub const COMPENSATE_REMOVE_PARTY: &str = "removeParty";
pub const COMPENSATE_REMOVE_NATURAL_PERSON: &str = "removeNaturalPerson";
pub const COMPENSATE_REMOVE_LEGAL_PERSON: &str = "removeLegalPerson";
pub const COMPENSATE_REMOVE_STATUS_ENTRY: &str = "removeStatusEntry";
pub const COMPENSATE_REMOVE_PEP: &str = "removePep";
pub const COMPENSATE_REMOVE_IDENTITY_DOCUMENT: &str = "removeIdentityDocument";
pub const COMPENSATE_REMOVE_ADDRESS: &str = "removeAddress";
pub const COMPENSATE_REMOVE_EMAIL: &str = "removeEmail";
pub const COMPENSATE_REMOVE_PHONE: &str = "removePhone";
pub const COMPENSATE_REMOVE_ECONOMIC_ACTIVITY_LINK: &str = "removeEconomicActivityLink";
pub const COMPENSATE_REMOVE_CONSENT: &str = "removeConsent";
pub const COMPENSATE_REMOVE_PARTY_PROVIDER: &str = "removePartyProvider";
pub const COMPENSATE_REMOVE_PARTY_RELATIONSHIP: &str = "removePartyRelationship";
pub const COMPENSATE_REMOVE_PARTY_GROUP_MEMBERSHIP: &str = "removePartyGroupMembership";

pub const EVENT_PARTY_REGISTERED: &str = "party.registered";
pub const EVENT_NATURAL_PERSON_REGISTERED: &str = "naturalperson.registered";
pub const EVENT_LEGAL_PERSON_REGISTERED: &str = "legalperson.registered";
pub const EVENT_PARTY_STATUS_REGISTERED: &str = "partystatus.registered";
pub const EVENT_PEP_REGISTERED: &str = "pep.registered";
pub const EVENT_IDENTITY_DOCUMENT_REGISTERED: &str = "identitydocument.registered";
pub const EVENT_ADDRESS_REGISTERED: &str = "address.registered";
pub const EVENT_EMAIL_REGISTERED: &str = "email.registered";
pub const EVENT_PHONE_REGISTERED: &str = "phone.registered";
pub const EVENT_ECONOMIC_ACTIVITY_REGISTERED: &str = "economicactivity.registered";
pub const EVENT_CONSENT_REGISTERED: &str = "consent.registered";
pub const EVENT_PARTY_PROVIDER_REGISTERED: &str = "partyprovider.registered";
pub const EVENT_PARTY_RELATIONSHIP_REGISTERED: &str = "partyrelationship.registered";
pub const EVENT_PARTY_GROUP_MEMBERSHIP_REGISTERED: &str = "partygroupmembership.registered";

fn is_individual(ctx: &SagaContext) -> bool {
    ctx.matches(&CTX_CUSTOMER_TYPE, KIND_INDIVIDUAL.to_string())
}

fn is_organization(ctx: &SagaContext) -> bool {
    ctx.matches(&CTX_CUSTOMER_TYPE, KIND_ORGANIZATION.to_string())
}

/// A sub-resource step hanging off the party.
fn party_step(id: &str, compensation: &str, event: &str) -> StepDefinition {
    StepDefinition::new(id)
        .depends_on([STEP_REGISTER_PARTY])
        .compensate(compensation)
        .event(event)
        .requires_input()
}

/// A fanned-out sub-resource step; siblings run one at a time.
fn party_list_step(id: &str, compensation: &str, event: &str) -> StepDefinition {
    party_step(id, compensation, event).max_parallel(1)
}

pub fn saga(client: &Arc<dyn CustomersClient>) -> SagaBuilder {
    let party_client = Arc::clone(client);
    let register_party = step_fn(move |cmd: RegisterPartyCommand, ctx: SagaContext| {
        let client = Arc::clone(&party_client);
        async move {
            let party_id = client.create_party(&cmd).await?;
            ctx.put(&CTX_CUSTOMER_TYPE, cmd.party_kind)?;
            ctx.put(&CTX_PARTY_ID, party_id)?;
            tracing::debug!(party_id, "Party registered");
            Ok(Some(party_id))
        }
    });

    SagaDefinition::builder(SAGA_NAME)
        .step(
            StepDefinition::new(STEP_REGISTER_PARTY)
                .compensate(COMPENSATE_REMOVE_PARTY)
                .event(EVENT_PARTY_REGISTERED),
            register_party,
        )
        .step(
            party_step(
                STEP_REGISTER_NATURAL_PERSON,
                COMPENSATE_REMOVE_NATURAL_PERSON,
                EVENT_NATURAL_PERSON_REGISTERED,
            )
            .when(is_individual),
            create_step(client, |c, party_id, cmd: RegisterNaturalPersonCommand| async move {
                c.create_natural_person(party_id, &cmd).await
            }),
        )
        .step(
            party_step(
                STEP_REGISTER_LEGAL_PERSON,
                COMPENSATE_REMOVE_LEGAL_PERSON,
                EVENT_LEGAL_PERSON_REGISTERED,
            )
            .when(is_organization),
            create_step(client, |c, party_id, cmd: RegisterLegalPersonCommand| async move {
                c.create_legal_person(party_id, &cmd).await
            }),
        )
        .step(
            party_list_step(
                STEP_REGISTER_STATUS_ENTRY,
                COMPENSATE_REMOVE_STATUS_ENTRY,
                EVENT_PARTY_STATUS_REGISTERED,
            ),
            create_step(client, |c, party_id, cmd: RegisterStatusEntryCommand| async move {
                c.create_status_entry(party_id, &cmd.with_party_id(party_id))
                    .await
            }),
        )
        .step(
            party_step(STEP_REGISTER_PEP, COMPENSATE_REMOVE_PEP, EVENT_PEP_REGISTERED)
                .when(is_individual),
            create_step(client, |c, party_id, cmd: RegisterPepCommand| async move {
                c.create_pep(party_id, &cmd).await
            }),
        )
        .step(
            party_list_step(
                STEP_REGISTER_IDENTITY_DOCUMENT,
                COMPENSATE_REMOVE_IDENTITY_DOCUMENT,
                EVENT_IDENTITY_DOCUMENT_REGISTERED,
            ),
            create_step(
                client,
                |c, party_id, cmd: RegisterIdentityDocumentCommand| async move {
                    c.create_identity_document(party_id, &cmd).await
                },
            ),
        )
        .step(
            party_list_step(
                STEP_REGISTER_ADDRESS,
                COMPENSATE_REMOVE_ADDRESS,
                EVENT_ADDRESS_REGISTERED,
            ),
            create_step(client, |c, party_id, cmd: RegisterAddressCommand| async move {
                c.create_address(party_id, &cmd.with_party_id(party_id))
                    .await
            }),
        )
        .step(
            party_list_step(
                STEP_REGISTER_EMAIL,
                COMPENSATE_REMOVE_EMAIL,
                EVENT_EMAIL_REGISTERED,
            ),
            create_step(client, |c, party_id, cmd: RegisterEmailCommand| async move {
                c.create_email(party_id, &cmd.with_party_id(party_id)).await
            }),
        )
        .step(
            party_list_step(
                STEP_REGISTER_PHONE,
                COMPENSATE_REMOVE_PHONE,
                EVENT_PHONE_REGISTERED,
            ),
            create_step(client, |c, party_id, cmd: RegisterPhoneCommand| async move {
                c.create_phone(party_id, &cmd.with_party_id(party_id)).await
            }),
        )
        .step(
            party_list_step(
                STEP_REGISTER_ECONOMIC_ACTIVITY_LINK,
                COMPENSATE_REMOVE_ECONOMIC_ACTIVITY_LINK,
                EVENT_ECONOMIC_ACTIVITY_REGISTERED,
            ),
            create_step(
                client,
                |c, party_id, cmd: RegisterEconomicActivityLinkCommand| async move {
                    c.create_economic_activity_link(party_id, &cmd).await
                },
            ),
        )
        .step(
            party_list_step(
                STEP_REGISTER_CONSENT,
                COMPENSATE_REMOVE_CONSENT,
                EVENT_CONSENT_REGISTERED,
            )
            .when(is_individual),
            create_step(client, |c, party_id, cmd: RegisterConsentCommand| async move {
                c.create_consent(party_id, &cmd).await
            }),
        )
        .step(
            party_list_step(
                STEP_REGISTER_PARTY_PROVIDER,
                COMPENSATE_REMOVE_PARTY_PROVIDER,
                EVENT_PARTY_PROVIDER_REGISTERED,
            ),
            create_step(
                client,
                |c, party_id, cmd: RegisterPartyProviderCommand| async move {
                    c.create_provider(party_id, &cmd).await
                },
            ),
        )
        .step(
            party_list_step(
                STEP_REGISTER_PARTY_RELATIONSHIP,
                COMPENSATE_REMOVE_PARTY_RELATIONSHIP,
                EVENT_PARTY_RELATIONSHIP_REGISTERED,
            ),
            create_step(
                client,
                |c, party_id, cmd: RegisterPartyRelationshipCommand| async move {
                    c.create_relationship(party_id, &cmd).await
                },
            ),
        )
        .step(
            party_list_step(
                STEP_REGISTER_PARTY_GROUP_MEMBERSHIP,
                COMPENSATE_REMOVE_PARTY_GROUP_MEMBERSHIP,
                EVENT_PARTY_GROUP_MEMBERSHIP_REGISTERED,
            ),
            create_step(
                client,
                |c, party_id, cmd: RegisterPartyGroupMembershipCommand| async move {
                    c.create_group_membership(party_id, &cmd).await
                },
            ),
        )
        .compensation(
            COMPENSATE_REMOVE_PARTY,
            remove_compensation(client, ResourceKind::Party),
        )
        .compensation(
            COMPENSATE_REMOVE_NATURAL_PERSON,
            remove_compensation(client, ResourceKind::NaturalPerson),
        )
        .compensation(
            COMPENSATE_REMOVE_LEGAL_PERSON,
            remove_compensation(client, ResourceKind::LegalPerson),
        )
        .compensation(
            COMPENSATE_REMOVE_STATUS_ENTRY,
            remove_compensation(client, ResourceKind::StatusEntry),
        )
        .compensation(
            COMPENSATE_REMOVE_PEP,
            remove_compensation(client, ResourceKind::Pep),
        )
        .compensation(
            COMPENSATE_REMOVE_IDENTITY_DOCUMENT,
            remove_compensation(client, ResourceKind::IdentityDocument),
        )
        .compensation(
            COMPENSATE_REMOVE_ADDRESS,
            remove_compensation(client, ResourceKind::Address),
        )
        .compensation(
            COMPENSATE_REMOVE_EMAIL,
            remove_compensation(client, ResourceKind::Email),
        )
        .compensation(
            COMPENSATE_REMOVE_PHONE,
            remove_compensation(client, ResourceKind::Phone),
        )
        .compensation(
            COMPENSATE_REMOVE_ECONOMIC_ACTIVITY_LINK,
            remove_compensation(client, ResourceKind::EconomicActivityLink),
        )
        .compensation(
            COMPENSATE_REMOVE_CONSENT,
            remove_compensation(client, ResourceKind::Consent),
        )
        .compensation(
            COMPENSATE_REMOVE_PARTY_PROVIDER,
            remove_compensation(client, ResourceKind::Provider),
        )
        .compensation(
            COMPENSATE_REMOVE_PARTY_RELATIONSHIP,
            remove_compensation(client, ResourceKind::Relationship),
        )
        .compensation(
            COMPENSATE_REMOVE_PARTY_GROUP_MEMBERSHIP,
            remove_compensation(client, ResourceKind::GroupMembership),
        )
}
