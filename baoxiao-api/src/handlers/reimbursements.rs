use actix_web::{web, HttpResponse, Result as ActixResult};
use serde::Deserialize;
use shared_types::{
    CreateReimbursementRequest, DeleteReimbursementRequest, MonthlySummariesResponse,
    ReimbursementDetailsResponse, ReimbursementRecord, ReimbursementsResponse,
    UpdateReimbursementRequest,
};
use std::sync::Arc;

use crate::config::ApiConfig;
use crate::database::monthly_summaries as summaries_db;
use crate::database::reimbursement_details as details_db;
use crate::database::reimbursements as db;
use crate::database::Database;
use crate::helpers::protection::{is_protected_month, protected_months_message, verify_admin};

#[derive(Debug)]
enum ReimbursementError {
    Validation(String),
    NotFound,
    Internal(String),
}

impl std::fmt::Display for ReimbursementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReimbursementError::Validation(msg) => write!(f, "{}", msg),
            ReimbursementError::NotFound => write!(f, "Reimbursement record not found"),
            ReimbursementError::Internal(msg) => write!(f, "{}", msg),
        }
    }
}

impl actix_web::error::ResponseError for ReimbursementError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ReimbursementError::Validation(msg) => {
                HttpResponse::BadRequest().json(serde_json::json!({ "error": msg }))
            }
            ReimbursementError::NotFound => HttpResponse::NotFound()
                .json(serde_json::json!({ "error": "Reimbursement record not found" })),
            ReimbursementError::Internal(msg) => {
                HttpResponse::InternalServerError().json(serde_json::json!({ "error": msg }))
            }
        }
    }
}

/// Mutations of protected months answer 200 with this body instead of
/// applying; the client re-submits with admin credentials attached.
fn requires_auth_response() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "success": false,
        "requiresAuth": true,
        "message": protected_months_message(),
    }))
}

#[derive(Deserialize)]
pub struct ListQuery {
    month: Option<String>,
}

pub async fn list_reimbursements(
    db: web::Data<Arc<Database>>,
    query: web::Query<ListQuery>,
) -> ActixResult<HttpResponse> {
    let reimbursements = match &query.month {
        Some(month) => db::list_by_month(db.async_connection.clone(), month).await,
        None => db::list_all(db.async_connection.clone()).await,
    }
    .map_err(|e| ReimbursementError::Internal(e.to_string()))?;

    Ok(HttpResponse::Ok().json(ReimbursementsResponse { reimbursements }))
}

pub async fn create_reimbursement(
    db: web::Data<Arc<Database>>,
    request: web::Json<CreateReimbursementRequest>,
) -> ActixResult<HttpResponse> {
    let req = request.into_inner();

    if req.employee_name.trim().is_empty() {
        return Err(ReimbursementError::Validation("Employee name cannot be empty".to_string()).into());
    }
    if req.month.trim().is_empty() {
        return Err(ReimbursementError::Validation("Month cannot be empty".to_string()).into());
    }

    let record = ReimbursementRecord {
        id: 0,
        employee_name: req.employee_name,
        amount: req.amount,
        account_number: req.account_number.unwrap_or_default(),
        bank_branch: req.bank_branch.unwrap_or_default(),
        note: req.note,
        month: req.month,
        created_at: chrono::Utc::now().timestamp(),
    };

    let id = db::insert_record(db.async_connection.clone(), &record)
        .await
        .map_err(|e| ReimbursementError::Internal(e.to_string()))?;
    summaries_db::refresh_summary(db.async_connection.clone(), &record.month)
        .await
        .map_err(|e| ReimbursementError::Internal(e.to_string()))?;

    Ok(HttpResponse::Created().json(ReimbursementRecord { id, ..record }))
}

pub async fn update_reimbursement(
    db: web::Data<Arc<Database>>,
    config: web::Data<ApiConfig>,
    path: web::Path<i64>,
    request: web::Json<UpdateReimbursementRequest>,
) -> ActixResult<HttpResponse> {
    let id = path.into_inner();
    let req = request.into_inner();

    let existing = db::get_record(db.async_connection.clone(), id)
        .await
        .map_err(|e| ReimbursementError::Internal(e.to_string()))?
        .ok_or(ReimbursementError::NotFound)?;

    if is_protected_month(&existing.month) && !credentials_valid(&config, &req.admin_username, &req.admin_password) {
        return Ok(requires_auth_response());
    }

    db::update_fields(
        db.async_connection.clone(),
        id,
        req.employee_name.as_deref(),
        req.amount,
        req.note.as_deref(),
    )
    .await
    .map_err(|e| ReimbursementError::Internal(e.to_string()))?;
    summaries_db::refresh_summary(db.async_connection.clone(), &existing.month)
        .await
        .map_err(|e| ReimbursementError::Internal(e.to_string()))?;

    let updated = db::get_record(db.async_connection.clone(), id)
        .await
        .map_err(|e| ReimbursementError::Internal(e.to_string()))?
        .ok_or(ReimbursementError::NotFound)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "record": updated,
    })))
}

pub async fn delete_reimbursement(
    db: web::Data<Arc<Database>>,
    config: web::Data<ApiConfig>,
    path: web::Path<i64>,
    request: Option<web::Json<DeleteReimbursementRequest>>,
) -> ActixResult<HttpResponse> {
    let id = path.into_inner();
    let req = request.map(web::Json::into_inner).unwrap_or_default();

    let existing = db::get_record(db.async_connection.clone(), id)
        .await
        .map_err(|e| ReimbursementError::Internal(e.to_string()))?
        .ok_or(ReimbursementError::NotFound)?;

    if is_protected_month(&existing.month) && !credentials_valid(&config, &req.admin_username, &req.admin_password) {
        return Ok(requires_auth_response());
    }

    db::delete_record(db.async_connection.clone(), id)
        .await
        .map_err(|e| ReimbursementError::Internal(e.to_string()))?;
    summaries_db::refresh_summary(db.async_connection.clone(), &existing.month)
        .await
        .map_err(|e| ReimbursementError::Internal(e.to_string()))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}

pub async fn get_reimbursement_details(
    db: web::Data<Arc<Database>>,
    path: web::Path<i64>,
) -> ActixResult<HttpResponse> {
    let id = path.into_inner();

    let record = db::get_record(db.async_connection.clone(), id)
        .await
        .map_err(|e| ReimbursementError::Internal(e.to_string()))?
        .ok_or(ReimbursementError::NotFound)?;

    let details = details_db::list_for_employee_month(
        db.async_connection.clone(),
        &record.employee_name,
        &record.month,
    )
    .await
    .map_err(|e| ReimbursementError::Internal(e.to_string()))?;

    Ok(HttpResponse::Ok().json(ReimbursementDetailsResponse { details }))
}

pub async fn list_summaries(db: web::Data<Arc<Database>>) -> ActixResult<HttpResponse> {
    let summaries = summaries_db::list_summaries(db.async_connection.clone())
        .await
        .map_err(|e| ReimbursementError::Internal(e.to_string()))?;

    Ok(HttpResponse::Ok().json(MonthlySummariesResponse { summaries }))
}

fn credentials_valid(
    config: &ApiConfig,
    username: &Option<String>,
    password: &Option<String>,
) -> bool {
    match (username, password) {
        (Some(u), Some(p)) => verify_admin(&config.admin, u, p),
        _ => false,
    }
}
