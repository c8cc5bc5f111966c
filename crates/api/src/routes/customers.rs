//! Customer command endpoints.
//!
//! Each handler runs one saga. A completed saga answers with its
//! [`SagaResult`]; anything else becomes an [`ApiError::SagaFailed`].

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use customer::{
    CustomerCommandService, PreferredChannelCommand, RegisterAddressCommand,
    RegisterCustomerCommand, RegisterEmailCommand, RegisterPhoneCommand, UpdateNameCommand,
};
use saga::SagaResult;
use serde::Deserialize;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub service: CustomerCommandService,
}

type Shared = State<Arc<AppState>>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNameRequest {
    pub new_name: String,
}

fn respond(result: SagaResult, success: StatusCode) -> Result<Response, ApiError> {
    if !result.is_completed() {
        return Err(result.into());
    }
    if success == StatusCode::NO_CONTENT {
        return Ok(success.into_response());
    }
    Ok((success, Json(result)).into_response())
}

/// POST /api/v1/customers
#[tracing::instrument(skip(state, cmd))]
pub async fn register(
    State(state): Shared,
    Json(cmd): Json<RegisterCustomerCommand>,
) -> Result<Response, ApiError> {
    let result = state.service.register(cmd).await?;
    respond(result, StatusCode::NO_CONTENT)
}

/// PATCH /api/v1/customers/{party_id}/name
#[tracing::instrument(skip(state, req))]
pub async fn update_name(
    State(state): Shared,
    Path(party_id): Path<i64>,
    Json(req): Json<UpdateNameRequest>,
) -> Result<Response, ApiError> {
    if req.new_name.trim().is_empty() {
        return Err(ApiError::BadRequest("newName must not be empty".into()));
    }
    let cmd = UpdateNameCommand {
        party_id,
        new_name: req.new_name,
    };
    let result = state.service.update_name(cmd).await?;
    respond(result, StatusCode::OK)
}

/// POST /api/v1/customers/{party_id}/addresses
#[tracing::instrument(skip(state, cmd))]
pub async fn add_address(
    State(state): Shared,
    Path(party_id): Path<i64>,
    Json(cmd): Json<RegisterAddressCommand>,
) -> Result<Response, ApiError> {
    let result = state.service.add_address(party_id, cmd).await?;
    respond(result, StatusCode::CREATED)
}

/// PATCH /api/v1/customers/{party_id}/addresses/{address_id}
#[tracing::instrument(skip(state, cmd))]
pub async fn update_address(
    State(state): Shared,
    Path((party_id, address_id)): Path<(i64, i64)>,
    Json(cmd): Json<RegisterAddressCommand>,
) -> Result<Response, ApiError> {
    let result = state
        .service
        .update_address(party_id, address_id, cmd)
        .await?;
    respond(result, StatusCode::OK)
}

/// DELETE /api/v1/customers/{party_id}/addresses/{address_id}
#[tracing::instrument(skip(state))]
pub async fn remove_address(
    State(state): Shared,
    Path((party_id, address_id)): Path<(i64, i64)>,
) -> Result<Response, ApiError> {
    let result = state.service.remove_address(party_id, address_id).await?;
    respond(result, StatusCode::OK)
}

/// POST /api/v1/customers/{party_id}/emails
#[tracing::instrument(skip(state, cmd))]
pub async fn add_email(
    State(state): Shared,
    Path(party_id): Path<i64>,
    Json(cmd): Json<RegisterEmailCommand>,
) -> Result<Response, ApiError> {
    let result = state.service.add_email(party_id, cmd).await?;
    respond(result, StatusCode::CREATED)
}

/// DELETE /api/v1/customers/{party_id}/emails/{email_id}
#[tracing::instrument(skip(state))]
pub async fn remove_email(
    State(state): Shared,
    Path((party_id, email_id)): Path<(i64, i64)>,
) -> Result<Response, ApiError> {
    let result = state.service.remove_email(party_id, email_id).await?;
    respond(result, StatusCode::OK)
}

/// POST /api/v1/customers/{party_id}/phones
#[tracing::instrument(skip(state, cmd))]
pub async fn add_phone(
    State(state): Shared,
    Path(party_id): Path<i64>,
    Json(cmd): Json<RegisterPhoneCommand>,
) -> Result<Response, ApiError> {
    let result = state.service.add_phone(party_id, cmd).await?;
    respond(result, StatusCode::CREATED)
}

/// DELETE /api/v1/customers/{party_id}/phones/{phone_id}
#[tracing::instrument(skip(state))]
pub async fn remove_phone(
    State(state): Shared,
    Path((party_id, phone_id)): Path<(i64, i64)>,
) -> Result<Response, ApiError> {
    let result = state.service.remove_phone(party_id, phone_id).await?;
    respond(result, StatusCode::OK)
}

/// POST /api/v1/customers/{party_id}/preferred-channel
#[tracing::instrument(skip(state, cmd))]
pub async fn set_preferred_channel(
    State(state): Shared,
    Path(party_id): Path<i64>,
    Json(cmd): Json<PreferredChannelCommand>,
) -> Result<Response, ApiError> {
    if cmd.email_id.is_none() && cmd.phone_id.is_none() {
        return Err(ApiError::BadRequest(
            "one of emailId or phoneId is required".into(),
        ));
    }
    let result = state.service.set_preferred_channel(party_id, cmd).await?;
    respond(result, StatusCode::OK)
}

/// POST /api/v1/customers/{party_id}/dormant
#[tracing::instrument(skip(state))]
pub async fn mark_dormant(
    State(state): Shared,
    Path(party_id): Path<i64>,
) -> Result<Response, ApiError> {
    respond(state.service.mark_dormant(party_id).await?, StatusCode::OK)
}

/// POST /api/v1/customers/{party_id}/reactivate
#[tracing::instrument(skip(state))]
pub async fn reactivate(
    State(state): Shared,
    Path(party_id): Path<i64>,
) -> Result<Response, ApiError> {
    respond(state.service.reactivate(party_id).await?, StatusCode::OK)
}

/// POST /api/v1/customers/{party_id}/deceased
#[tracing::instrument(skip(state))]
pub async fn mark_deceased(
    State(state): Shared,
    Path(party_id): Path<i64>,
) -> Result<Response, ApiError> {
    respond(state.service.mark_deceased(party_id).await?, StatusCode::OK)
}

/// POST /api/v1/customers/{party_id}/closure-request
#[tracing::instrument(skip(state))]
pub async fn request_closure(
    State(state): Shared,
    Path(party_id): Path<i64>,
) -> Result<Response, ApiError> {
    respond(state.service.request_closure(party_id).await?, StatusCode::OK)
}

/// POST /api/v1/customers/{party_id}/confirm-closure
#[tracing::instrument(skip(state))]
pub async fn confirm_closure(
    State(state): Shared,
    Path(party_id): Path<i64>,
) -> Result<Response, ApiError> {
    respond(state.service.confirm_closure(party_id).await?, StatusCode::OK)
}

/// POST /api/v1/customers/{party_id}/lock
#[tracing::instrument(skip(state))]
pub async fn lock_profile(
    State(state): Shared,
    Path(party_id): Path<i64>,
) -> Result<Response, ApiError> {
    respond(state.service.lock_profile(party_id).await?, StatusCode::OK)
}

/// POST /api/v1/customers/{party_id}/unlock
#[tracing::instrument(skip(state))]
pub async fn unlock_profile(
    State(state): Shared,
    Path(party_id): Path<i64>,
) -> Result<Response, ApiError> {
    respond(state.service.unlock_profile(party_id).await?, StatusCode::OK)
}
