//! Login and profile endpoints.

use std::sync::Arc;

use accounts::Profile;
use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use common::CustomerId;
use serde::{Deserialize, Serialize};
use store::Store;

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct UpdateAddressRequest {
    pub address: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub customer: Profile,
}

#[derive(Serialize)]
pub struct AddressUpdatedResponse {
    pub message: &'static str,
    pub address: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// POST /customer/login
#[tracing::instrument(skip(state, payload))]
pub async fn login<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Profile>, ApiError> {
    let Json(req) = payload?;
    let profile = state.access.authenticate(&req.email, &req.password).await?;
    Ok(Json(profile))
}

/// GET /customer/profile/{id}
#[tracing::instrument(skip(state))]
pub async fn profile<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let Path(id) = id?;
    let customer = state.access.get_profile(CustomerId::new(id)).await?;
    Ok(Json(ProfileResponse { customer }))
}

/// PUT /customer/profile/{id}
#[tracing::instrument(skip(state, payload))]
pub async fn update_address<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateAddressRequest>, JsonRejection>,
) -> Result<Json<AddressUpdatedResponse>, ApiError> {
    let Path(id) = id?;
    let Json(req) = payload?;

    let address = state
        .access
        .update_address(CustomerId::new(id), &req.address)
        .await?;

    Ok(Json(AddressUpdatedResponse {
        message: "Address updated successfully",
        address,
    }))
}

/// PUT /customer/changepass/{id}
#[tracing::instrument(skip(state, payload))]
pub async fn change_password<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(id) = id?;
    let Json(req) = payload?;

    state
        .access
        .change_password(CustomerId::new(id), &req.old_password, &req.new_password)
        .await?;

    Ok(Json(MessageResponse {
        message: "Password changed successfully",
    }))
}
