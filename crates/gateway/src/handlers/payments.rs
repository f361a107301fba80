//! Payment submission and verification handlers

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{form::Form, paper_key};
use crate::AppState;
use reviewflow_common::{
    auth::{AuthContext, Role},
    errors::{AppError, Result},
    workflow::{Payment, PaymentDecision, PaymentMethod, PaymentSubmission},
};

/// Admin decision on a pending payment
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePaymentRequest {
    #[validate(length(min = 1))]
    pub status: String,

    #[serde(default)]
    #[validate(length(max = 2000))]
    pub reason: Option<String>,
}

/// Submit proof of payment (`paperId`, `amount`, `method`, `transactionId`, file part `proof`)
pub async fn submit_payment(
    State(state): State<AppState>,
    auth: AuthContext,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Payment>)> {
    let mut form = Form::read(multipart).await?;

    let submission = PaymentSubmission {
        paper: paper_key(form.required("paperId")?)?,
        amount: form.required("amount")?.to_string(),
        method: form.required("method")?.parse::<PaymentMethod>()?,
        transaction_id: form.text("transactionId").unwrap_or_default().to_string(),
    };
    let proof = form.take_file("proof");

    let payment = state
        .workflow
        .submit_payment(&auth.identity, submission, proof)
        .await?;

    tracing::info!(
        payment_id = %payment.id,
        paper_id = %payment.paper_id,
        request_id = %auth.request_id,
        "Payment submitted"
    );

    Ok((StatusCode::CREATED, Json(payment)))
}

/// Verify or reject a pending payment
pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<UpdatePaymentRequest>,
) -> Result<Json<Payment>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let decision = PaymentDecision::parse(&request.status, request.reason)?;
    let payment = state
        .workflow
        .decide_payment(&auth.identity, payment_id, decision)
        .await?;

    Ok(Json(payment))
}

/// Every payment, for admins
pub async fn list_payments(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<Payment>>> {
    if auth.identity.role != Role::Admin {
        return Err(AppError::forbidden("Only an admin may list all payments"));
    }
    let payments = state.workflow.list_payments(&auth.identity, None).await?;
    Ok(Json(payments))
}

/// The calling author's payments
pub async fn my_payments(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<Payment>>> {
    if auth.identity.role != Role::Author {
        return Err(AppError::forbidden("Only authors have payments of their own"));
    }
    let payments = state.workflow.list_payments(&auth.identity, None).await?;
    Ok(Json(payments))
}
