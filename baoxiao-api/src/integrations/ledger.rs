use crate::config::SyncConfig;
use extractors::aggregate::DATE_FIELD;
use extractors::{resolve_month_key, MonthKey};
use regex::Regex;
use serde::Deserialize;
use shared_types::RawLedgerItem;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub const LEDGER_BASE_URL: &str = "https://open.feishu.cn/open-apis";

/// Error code the ledger uses for missing application capabilities.
const PERMISSION_DENIED_CODE: i64 = 99991672;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger application lacks required permissions: {details}")]
    PermissionDenied {
        permissions: Vec<String>,
        auth_url: Option<String>,
        details: String,
    },
    #[error("ledger request failed with status {status}")]
    Transport { status: u16, body: String },
    #[error("ledger request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// One page of the cursor-based search protocol.
#[derive(Debug)]
pub struct SearchPage {
    pub items: Vec<RawLedgerItem>,
    pub has_more: bool,
    pub page_token: Option<String>,
}

/// Seam between the pagination loop and the wire. The real client talks
/// HTTP; tests drive the loop with canned pages.
pub trait LedgerSource {
    fn search_page(
        &self,
        page_size: u32,
        page_token: Option<String>,
    ) -> impl Future<Output = Result<SearchPage, LedgerError>> + Send;
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
    error: Option<ErrorDetail>,
    data: Option<SearchData>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    permission_violations: Vec<PermissionViolation>,
}

#[derive(Debug, Deserialize)]
struct PermissionViolation {
    #[serde(default)]
    subject: String,
}

#[derive(Debug, Default, Deserialize)]
struct SearchData {
    #[serde(default)]
    items: Vec<RawLedgerItem>,
    #[serde(default)]
    has_more: bool,
    page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenEnvelope {
    #[serde(default)]
    code: i64,
    tenant_access_token: Option<String>,
    #[serde(default)]
    expire: i64,
}

pub struct LedgerClient {
    http: reqwest::Client,
    app_token: String,
    table_id: String,
    access_token: String,
}

impl LedgerClient {
    pub fn new(app_token: String, table_id: String, access_token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            app_token,
            table_id,
            access_token,
        }
    }
}

impl LedgerSource for LedgerClient {
    fn search_page(
        &self,
        page_size: u32,
        page_token: Option<String>,
    ) -> impl Future<Output = Result<SearchPage, LedgerError>> + Send {
        async move {
            let mut body = serde_json::json!({
                "page_size": page_size,
                // newest first, so hitting a record cap drops the oldest rows
                "sort": [{"field_name": DATE_FIELD, "desc": true}],
            });
            if let Some(token) = page_token {
                body["page_token"] = token.into();
            }

            let response = self
                .http
                .post(format!(
                    "{LEDGER_BASE_URL}/bitable/v1/apps/{}/tables/{}/records/search",
                    self.app_token, self.table_id
                ))
                .bearer_auth(&self.access_token)
                .json(&body)
                .send()
                .await?;

            let status = response.status().as_u16();
            let text = response.text().await?;

            let envelope: SearchEnvelope =
                serde_json::from_str(&text).map_err(|_| LedgerError::Transport {
                    status,
                    body: text.clone(),
                })?;

            if !(200..300).contains(&status) || envelope.code != 0 {
                if envelope.code == PERMISSION_DENIED_CODE {
                    return Err(permission_denied(&envelope));
                }
                return Err(LedgerError::Transport { status, body: text });
            }

            let data = envelope.data.unwrap_or_default();
            Ok(SearchPage {
                items: data.items,
                has_more: data.has_more,
                page_token: data.page_token,
            })
        }
    }
}

fn permission_denied(envelope: &SearchEnvelope) -> LedgerError {
    let permissions = envelope
        .error
        .as_ref()
        .map(|e| {
            e.permission_violations
                .iter()
                .map(|v| v.subject.clone())
                .collect()
        })
        .unwrap_or_default();

    // remediation URL, when the upstream error message carries one
    let auth_url = Regex::new(r#"https://[^\s"]+"#)
        .ok()
        .and_then(|re| re.find(&envelope.msg))
        .map(|m| m.as_str().to_string());

    LedgerError::PermissionDenied {
        permissions,
        auth_url,
        details: envelope.msg.clone(),
    }
}

/// Exchange `app_id` + `app_secret` for a tenant access token.
pub async fn fetch_tenant_token(
    http: &reqwest::Client,
    app_id: &str,
    app_secret: &str,
) -> Result<(String, i64), LedgerError> {
    let response = http
        .post(format!("{LEDGER_BASE_URL}/auth/v3/tenant_access_token/internal"))
        .json(&serde_json::json!({"app_id": app_id, "app_secret": app_secret}))
        .send()
        .await?;

    let status = response.status().as_u16();
    let text = response.text().await?;

    let envelope: TokenEnvelope =
        serde_json::from_str(&text).map_err(|_| LedgerError::Transport {
            status,
            body: text.clone(),
        })?;

    match envelope.tenant_access_token {
        Some(token) if envelope.code == 0 => Ok((token, envelope.expire)),
        _ => Err(LedgerError::Transport { status, body: text }),
    }
}

/// Bounds on one full fetch. Mirrors `[sync]` configuration.
#[derive(Debug, Clone)]
pub struct FetchLimits {
    pub page_size: u32,
    pub max_records: usize,
    pub max_pages: usize,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl From<&SyncConfig> for FetchLimits {
    fn from(sync: &SyncConfig) -> Self {
        Self {
            page_size: sync.page_size,
            max_records: sync.max_records,
            max_pages: sync.max_pages,
            retry_attempts: sync.retry_attempts,
            retry_backoff_ms: sync.retry_backoff_ms,
        }
    }
}

/// Retrieve every page of ledger rows, then keep only rows whose resolved
/// month is on/after `cutoff` (the remote source cannot apply that filter
/// reliably server-side).
///
/// Termination guards, checked each iteration in order: record cap reached,
/// cursor seen before, cursor identical to the previous one, remote reports
/// no more pages, page ceiling reached. Guards truncate the result set;
/// they never raise. Errors from the source (permission / transport) abort
/// the whole fetch with no partial result.
pub async fn fetch_all_records<S: LedgerSource>(
    source: &S,
    limits: &FetchLimits,
    cutoff: MonthKey,
) -> Result<Vec<RawLedgerItem>, LedgerError> {
    let mut all_items: Vec<RawLedgerItem> = Vec::new();
    let mut seen_cursors: HashSet<String> = HashSet::new();
    let mut current_cursor: Option<String> = None;
    let mut page_count = 0usize;

    loop {
        page_count += 1;
        let page = search_with_retry(source, limits, current_cursor.clone()).await?;
        let fetched = page.items.len();
        all_items.extend(page.items);
        info!(
            "Ledger page {} returned {} rows, {} accumulated",
            page_count,
            fetched,
            all_items.len()
        );

        if all_items.len() >= limits.max_records {
            warn!(
                "Record cap of {} reached, stopping pagination",
                limits.max_records
            );
            all_items.truncate(limits.max_records);
            break;
        }
        let next_cursor = page.page_token;
        if let Some(cursor) = &next_cursor {
            if seen_cursors.contains(cursor) {
                warn!("Ledger returned an already-seen page cursor, stopping");
                break;
            }
            if current_cursor.as_deref() == Some(cursor.as_str()) {
                warn!("Ledger repeated the previous page cursor, stopping");
                break;
            }
            seen_cursors.insert(cursor.clone());
        }
        if !page.has_more {
            break;
        }
        if page_count >= limits.max_pages {
            warn!("Page cap of {} reached, stopping pagination", limits.max_pages);
            break;
        }
        current_cursor = next_cursor;
    }

    let fetched_total = all_items.len();
    let filtered: Vec<RawLedgerItem> = all_items
        .into_iter()
        .filter(|item| resolve_month_key(item).is_some_and(|m| m >= cutoff))
        .collect();
    info!(
        "Cutoff filter kept {} of {} fetched rows",
        filtered.len(),
        fetched_total
    );

    Ok(filtered)
}

async fn search_with_retry<S: LedgerSource>(
    source: &S,
    limits: &FetchLimits,
    page_token: Option<String>,
) -> Result<SearchPage, LedgerError> {
    let attempts = limits.retry_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match source.search_page(limits.page_size, page_token.clone()).await {
            Ok(page) => return Ok(page),
            Err(err) if attempt < attempts && is_transient(&err) => {
                warn!("Transient ledger failure (attempt {attempt}): {err}; retrying");
                tokio::time::sleep(Duration::from_millis(limits.retry_backoff_ms)).await;
            }
            Err(err) => return Err(err),
        }
    }
}

fn is_transient(err: &LedgerError) -> bool {
    match err {
        LedgerError::Http(e) => e.is_timeout() || e.is_connect(),
        LedgerError::Transport { status, .. } => *status >= 500,
        LedgerError::PermissionDenied { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn row(month: &str) -> RawLedgerItem {
        let fields = serde_json::json!({
            "支出人": "蒋坤洪",
            "月份": month,
            "金额": 100.0,
        });
        RawLedgerItem {
            record_id: "rec".to_string(),
            fields: fields.as_object().cloned().unwrap(),
        }
    }

    fn limits(max_records: usize, max_pages: usize) -> FetchLimits {
        FetchLimits {
            page_size: 500,
            max_records,
            max_pages,
            retry_attempts: 1,
            retry_backoff_ms: 0,
        }
    }

    /// Remote that always claims more pages and hands back the same cursor.
    struct LoopingSource {
        calls: AtomicUsize,
    }

    impl LedgerSource for LoopingSource {
        fn search_page(
            &self,
            _page_size: u32,
            _page_token: Option<String>,
        ) -> impl Future<Output = Result<SearchPage, LedgerError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(SearchPage {
                    items: vec![row("2025-12")],
                    has_more: true,
                    page_token: Some("constant-cursor".to_string()),
                })
            }
        }
    }

    #[tokio::test]
    async fn test_constant_cursor_terminates() {
        let source = LoopingSource {
            calls: AtomicUsize::new(0),
        };
        let result = fetch_all_records(&source, &limits(2000, 200), MonthKey::new(2025, 12))
            .await
            .unwrap();

        // the repeated cursor is detected on the second page
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_record_cap_truncates() {
        struct BigPageSource;
        impl LedgerSource for BigPageSource {
            fn search_page(
                &self,
                _page_size: u32,
                page_token: Option<String>,
            ) -> impl Future<Output = Result<SearchPage, LedgerError>> + Send {
                async move {
                    let cursor = match page_token.as_deref() {
                        None => "p1",
                        Some("p1") => "p2",
                        _ => "p3",
                    };
                    Ok(SearchPage {
                        items: (0..500).map(|_| row("2025-12")).collect(),
                        has_more: true,
                        page_token: Some(cursor.to_string()),
                    })
                }
            }
        }

        let result = fetch_all_records(&BigPageSource, &limits(800, 200), MonthKey::new(2025, 12))
            .await
            .unwrap();
        assert_eq!(result.len(), 800);
    }

    #[tokio::test]
    async fn test_page_cap_stops_fresh_cursors() {
        struct FreshCursorSource {
            calls: AtomicUsize,
        }
        impl LedgerSource for FreshCursorSource {
            fn search_page(
                &self,
                _page_size: u32,
                _page_token: Option<String>,
            ) -> impl Future<Output = Result<SearchPage, LedgerError>> + Send {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    Ok(SearchPage {
                        items: vec![row("2025-12")],
                        has_more: true,
                        page_token: Some(format!("cursor-{call}")),
                    })
                }
            }
        }

        let source = FreshCursorSource {
            calls: AtomicUsize::new(0),
        };
        let result = fetch_all_records(&source, &limits(2000, 5), MonthKey::new(2025, 12))
            .await
            .unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 5);
        assert_eq!(result.len(), 5);
    }

    #[tokio::test]
    async fn test_cutoff_filter_drops_older_months() {
        struct OnePageSource;
        impl LedgerSource for OnePageSource {
            fn search_page(
                &self,
                _page_size: u32,
                _page_token: Option<String>,
            ) -> impl Future<Output = Result<SearchPage, LedgerError>> + Send {
                async move {
                    Ok(SearchPage {
                        items: vec![
                            row("2025-11"),
                            row("2025-12"),
                            row("2026-1"),
                            row("月份未知"),
                        ],
                        has_more: false,
                        page_token: None,
                    })
                }
            }
        }

        let result = fetch_all_records(&OnePageSource, &limits(2000, 200), MonthKey::new(2025, 12))
            .await
            .unwrap();

        let months: Vec<Option<MonthKey>> = result.iter().map(resolve_month_key).collect();
        assert_eq!(
            months,
            vec![Some(MonthKey::new(2025, 12)), Some(MonthKey::new(2026, 1))]
        );
    }

    #[tokio::test]
    async fn test_source_error_aborts_with_no_partial_result() {
        struct FailingSecondPage;
        impl LedgerSource for FailingSecondPage {
            fn search_page(
                &self,
                _page_size: u32,
                page_token: Option<String>,
            ) -> impl Future<Output = Result<SearchPage, LedgerError>> + Send {
                async move {
                    if page_token.is_none() {
                        Ok(SearchPage {
                            items: vec![row("2025-12")],
                            has_more: true,
                            page_token: Some("p1".to_string()),
                        })
                    } else {
                        Err(LedgerError::PermissionDenied {
                            permissions: vec!["bitable:app".to_string()],
                            auth_url: None,
                            details: "missing scope".to_string(),
                        })
                    }
                }
            }
        }

        let err = fetch_all_records(
            &FailingSecondPage,
            &limits(2000, 200),
            MonthKey::new(2025, 12),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LedgerError::PermissionDenied { .. }));
    }
}
