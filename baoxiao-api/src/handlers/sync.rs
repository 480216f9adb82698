use actix_web::{web, HttpResponse, Result as ActixResult};
use extractors::month::parse_month;
use extractors::{aggregate_items, dedupe_items};
use shared_types::{LedgerTokenRequest, LedgerTokenResponse, SyncRequest, SyncResponse};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ApiConfig;
use crate::database::Database;
use crate::helpers::protection::{protected_months_message, verify_admin};
use crate::integrations::ledger::{
    fetch_all_records, fetch_tenant_token, FetchLimits, LedgerClient, LedgerError,
};
use crate::jobs::sync_manager::SyncManager;

#[derive(Debug)]
enum SyncError {
    Config(String),
    PermissionDenied {
        permissions: Vec<String>,
        auth_url: Option<String>,
        details: String,
    },
    Transport { status: u16, body: String },
    Internal(String),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Config(msg) => write!(f, "{}", msg),
            SyncError::PermissionDenied { details, .. } => write!(f, "{}", details),
            SyncError::Transport { status, .. } => {
                write!(f, "Ledger request failed with status {}", status)
            }
            SyncError::Internal(msg) => write!(f, "{}", msg),
        }
    }
}

impl actix_web::error::ResponseError for SyncError {
    fn error_response(&self) -> HttpResponse {
        match self {
            SyncError::Config(msg) => {
                HttpResponse::BadRequest().json(serde_json::json!({ "error": msg }))
            }
            SyncError::PermissionDenied {
                permissions,
                auth_url,
                details,
            } => HttpResponse::Forbidden().json(serde_json::json!({
                "error": details,
                "errorType": "permission_denied",
                "permissions": permissions,
                "authUrl": auth_url,
            })),
            SyncError::Transport { status, body } => {
                HttpResponse::BadGateway().json(serde_json::json!({
                    "error": format!("Ledger request failed with status {}", status),
                    "details": body,
                }))
            }
            SyncError::Internal(msg) => {
                HttpResponse::InternalServerError().json(serde_json::json!({ "error": msg }))
            }
        }
    }
}

impl From<LedgerError> for SyncError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::PermissionDenied {
                permissions,
                auth_url,
                details,
            } => SyncError::PermissionDenied {
                permissions,
                auth_url,
                details,
            },
            LedgerError::Transport { status, body } => SyncError::Transport { status, body },
            LedgerError::Http(e) => SyncError::Transport {
                status: e.status().map(|s| s.as_u16()).unwrap_or(502),
                body: e.to_string(),
            },
        }
    }
}

/// Run one full sync pass: fetch every ledger page, dedupe, aggregate and
/// reconcile against the store. Ledger parameters come from the request
/// body, falling back to `[ledger]` configuration.
pub async fn trigger_sync(
    db: web::Data<Arc<Database>>,
    config: web::Data<ApiConfig>,
    request: web::Json<SyncRequest>,
) -> ActixResult<HttpResponse> {
    let req = request.into_inner();
    let ledger_config = config.ledger.clone().unwrap_or_default();

    let app_token = req
        .app_token
        .or(ledger_config.app_token)
        .ok_or_else(|| SyncError::Config("No ledger app_token provided or configured".to_string()))?;
    let table_id = req
        .table_id
        .or(ledger_config.table_id)
        .ok_or_else(|| SyncError::Config("No ledger table_id provided or configured".to_string()))?;

    let access_token = match req.access_token {
        Some(token) => token,
        None => match (&ledger_config.app_id, &ledger_config.app_secret) {
            (Some(app_id), Some(app_secret)) => {
                let http = reqwest::Client::new();
                let (token, _expire) = fetch_tenant_token(&http, app_id, app_secret)
                    .await
                    .map_err(SyncError::from)?;
                token
            }
            _ => {
                return Err(SyncError::Config(
                    "No access token provided and no app_id/app_secret configured".to_string(),
                )
                .into())
            }
        },
    };

    let authorized = match (&req.admin_username, &req.admin_password) {
        (Some(username), Some(password)) => {
            let ok = verify_admin(&config.admin, username, password);
            if !ok {
                warn!("Sync request carried invalid admin credentials");
            }
            ok
        }
        _ => false,
    };

    let cutoff = parse_month(&config.sync.cutoff_month).ok_or_else(|| {
        SyncError::Config(format!(
            "Unparseable cutoff_month in configuration: {}",
            config.sync.cutoff_month
        ))
    })?;

    let client = LedgerClient::new(app_token, table_id, access_token);
    let limits = FetchLimits::from(&config.sync);
    let items = fetch_all_records(&client, &limits, cutoff)
        .await
        .map_err(SyncError::from)?;

    let deduped = dedupe_items(items);
    let entries = aggregate_items(&deduped);
    info!(
        "Aggregated {} ledger rows into {} employee-month entries",
        deduped.len(),
        entries.len()
    );

    let manager = SyncManager::new(db.async_connection.clone());
    let outcome = manager
        .reconcile(&entries, cutoff, authorized)
        .await
        .map_err(|e| SyncError::Internal(e.to_string()))?;

    let response = if outcome.requires_auth {
        SyncResponse {
            success: false,
            message: protected_months_message().to_string(),
            requires_auth: Some(true),
            inserted: 0,
            updated: 0,
            deleted: 0,
            skipped: outcome.counts.skipped,
        }
    } else {
        let c = &outcome.counts;
        SyncResponse {
            success: true,
            message: format!(
                "Sync complete: {} inserted, {} updated, {} deleted, {} skipped",
                c.inserted, c.updated, c.deleted, c.skipped
            ),
            requires_auth: None,
            inserted: c.inserted,
            updated: c.updated,
            deleted: c.deleted,
            skipped: c.skipped,
        }
    };

    Ok(HttpResponse::Ok().json(response))
}

/// Exchange configured (or request-supplied) app credentials for a tenant
/// access token, for clients that talk to the ledger directly.
pub async fn acquire_ledger_token(
    config: web::Data<ApiConfig>,
    request: web::Json<LedgerTokenRequest>,
) -> ActixResult<HttpResponse> {
    let req = request.into_inner();
    let ledger_config = config.ledger.clone().unwrap_or_default();

    let app_id = req
        .app_id
        .or(ledger_config.app_id)
        .ok_or_else(|| SyncError::Config("No ledger app_id provided or configured".to_string()))?;
    let app_secret = req
        .app_secret
        .or(ledger_config.app_secret)
        .ok_or_else(|| SyncError::Config("No ledger app_secret provided or configured".to_string()))?;

    let http = reqwest::Client::new();
    let (access_token, expire_time) = fetch_tenant_token(&http, &app_id, &app_secret)
        .await
        .map_err(SyncError::from)?;

    Ok(HttpResponse::Ok().json(LedgerTokenResponse {
        access_token,
        expire_time,
    }))
}
