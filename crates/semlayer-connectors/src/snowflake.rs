//! Snowflake session over the REST session protocol
//!
//! A session is opened with a login request that returns a session token.
//! Statements are posted to the query endpoint with JSON result format; a
//! statement that is still running returns a result URL that is polled until
//! the rows are ready. Large results arrive as extra chunks that are fetched
//! and appended in order. Closing posts a session delete.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use semlayer_config::{AuthMode, SnowflakeConfig};
use semlayer_core::{Result, SemlayerError};

use crate::auth::{account_identifier, KeyPair};
use crate::error::ConnectorError;
use crate::session::{QueryResult, WarehouseSession};

const CLIENT_APP_ID: &str = "Go";
const CLIENT_APP_VERSION: &str = "1.6.22";
const SNOWFLAKE_ACCEPT: &str = "application/snowflake";

/// Codes returned while a statement is still executing.
const QUERY_IN_PROGRESS: &str = "333333";
const QUERY_IN_PROGRESS_ASYNC: &str = "333334";

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const MAX_POLLS: u32 = 2400;

/// A live, authenticated Snowflake session.
pub struct SnowflakeSession {
    http: reqwest::Client,
    base_url: String,
    token: Mutex<Option<String>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for SnowflakeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnowflakeSession")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    data: Option<T>,
    code: Option<String>,
    message: Option<String>,
    #[serde(default)]
    success: bool,
}

impl<T> ApiResponse<T> {
    fn failure_message(&self) -> String {
        match (&self.message, &self.code) {
            (Some(m), Some(c)) => format!("{} (code {})", m, c),
            (Some(m), None) => m.clone(),
            (None, Some(c)) => format!("error code {}", c),
            (None, None) => "no message".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticatorData {
    token_url: String,
    sso_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    #[serde(default)]
    rowtype: Vec<RowType>,
    #[serde(default)]
    rowset: Vec<Vec<Option<String>>>,
    #[serde(default)]
    chunks: Vec<Chunk>,
    #[serde(default)]
    chunk_headers: HashMap<String, String>,
    qrmk: Option<String>,
    query_result_format: Option<String>,
    get_result_url: Option<String>,
    query_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RowType {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Chunk {
    url: String,
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

impl SnowflakeSession {
    /// Open a session with the single authentication mode configured.
    pub async fn connect(cfg: &SnowflakeConfig) -> Result<Self> {
        let mode = cfg.auth_mode()?;
        if let AuthMode::Authenticator { authenticator, .. } = &mode {
            if authenticator.eq_ignore_ascii_case("externalbrowser") {
                return Err(SemlayerError::connection(ConnectorError::ConnectionFailed(
                    "the externalbrowser authenticator needs an interactive browser and is not supported"
                        .to_string(),
                )));
            }
        }

        let base_url = base_url(cfg).map_err(SemlayerError::connection)?;
        let http = reqwest::Client::new();

        info!(
            "Connecting to {} as {} ({} auth)",
            base_url,
            cfg.user,
            mode.kind()
        );

        let token = login(&http, &base_url, cfg, &mode)
            .await
            .map_err(SemlayerError::connection)?;

        info!("Snowflake session established");
        Ok(Self {
            http,
            base_url,
            token: Mutex::new(Some(token)),
            sequence: AtomicU64::new(0),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn current_token(&self) -> std::result::Result<String, ConnectorError> {
        self.token.lock().await.clone().ok_or(ConnectorError::Closed)
    }

    fn session_headers(&self, token: &str) -> std::result::Result<HeaderMap, ConnectorError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Snowflake Token=\"{}\"", token))
            .map_err(|e| ConnectorError::Protocol(format!("invalid session token: {}", e)))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static(SNOWFLAKE_ACCEPT));
        headers.insert(USER_AGENT, HeaderValue::from_static(user_agent()));
        Ok(headers)
    }

    async fn fetch_result(
        &self,
        path: &str,
        token: &str,
    ) -> std::result::Result<ApiResponse<QueryData>, ConnectorError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .headers(self.session_headers(token)?)
            .send()
            .await?;
        read_json(response).await
    }

    async fn fetch_chunk(
        &self,
        chunk: &Chunk,
        headers: &HeaderMap,
    ) -> std::result::Result<Vec<Vec<Option<String>>>, ConnectorError> {
        let response = self.http.get(&chunk.url).headers(headers.clone()).send().await?;
        if !response.status().is_success() {
            return Err(ConnectorError::QueryFailed(format!(
                "result chunk download failed ({})",
                response.status()
            )));
        }
        // Chunks are a comma-separated list of row arrays without the outer brackets.
        let body = response.text().await?;
        serde_json::from_str(&format!("[{}]", body))
            .map_err(|e| ConnectorError::Protocol(format!("malformed result chunk: {}", e)))
    }

    async fn collect_rows(
        &self,
        data: QueryData,
    ) -> std::result::Result<QueryResult, ConnectorError> {
        if let Some(format) = &data.query_result_format {
            if !format.eq_ignore_ascii_case("json") {
                return Err(ConnectorError::Protocol(format!(
                    "unsupported result format '{}'",
                    format
                )));
            }
        }

        let columns = data.rowtype.into_iter().map(|r| r.name).collect();
        let mut rows = data.rowset;

        if !data.chunks.is_empty() {
            let mut headers = HeaderMap::new();
            for (name, value) in &data.chunk_headers {
                let name = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|e| ConnectorError::Protocol(e.to_string()))?;
                let value = HeaderValue::from_str(value)
                    .map_err(|e| ConnectorError::Protocol(e.to_string()))?;
                headers.insert(name, value);
            }
            if data.chunk_headers.is_empty() {
                if let Some(qrmk) = &data.qrmk {
                    headers.insert(
                        "x-amz-server-side-encryption-customer-algorithm",
                        HeaderValue::from_static("AES256"),
                    );
                    headers.insert(
                        "x-amz-server-side-encryption-customer-key",
                        HeaderValue::from_str(qrmk)
                            .map_err(|e| ConnectorError::Protocol(e.to_string()))?,
                    );
                }
            }

            debug!("Downloading {} result chunks", data.chunks.len());
            for chunk in &data.chunks {
                rows.extend(self.fetch_chunk(chunk, &headers).await?);
            }
        }

        Ok(QueryResult::new(columns, rows))
    }
}

#[async_trait]
impl WarehouseSession for SnowflakeSession {
    async fn query(&self, sql: &str) -> std::result::Result<QueryResult, ConnectorError> {
        let token = self.current_token().await?;
        let sequence_id = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        debug!("Executing statement #{}: {}", sequence_id, sql);

        let body = json!({
            "sqlText": sql,
            "asyncExec": false,
            "sequenceId": sequence_id,
            "querySubmissionTime": Utc::now().timestamp_millis(),
        });

        let response = self
            .http
            .post(format!(
                "{}/queries/v1/query-request?requestId={}",
                self.base_url,
                Uuid::new_v4()
            ))
            .headers(self.session_headers(&token)?)
            .json(&body)
            .send()
            .await?;
        let mut response: ApiResponse<QueryData> = read_json(response).await?;

        let mut polls = 0;
        while matches!(
            response.code.as_deref(),
            Some(QUERY_IN_PROGRESS) | Some(QUERY_IN_PROGRESS_ASYNC)
        ) {
            let data = response.data.take().unwrap_or_default();
            let result_url = data.get_result_url.ok_or_else(|| {
                ConnectorError::Protocol("query in progress without a result URL".to_string())
            })?;

            polls += 1;
            if polls > MAX_POLLS {
                return Err(ConnectorError::QueryFailed(format!(
                    "gave up waiting for query {}",
                    data.query_id.unwrap_or_default()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
            response = self.fetch_result(&result_url, &token).await?;
        }

        if !response.success {
            return Err(ConnectorError::QueryFailed(response.failure_message()));
        }

        let data = response
            .data
            .ok_or_else(|| ConnectorError::Protocol("query response without data".to_string()))?;
        self.collect_rows(data).await
    }

    async fn close(&self) -> std::result::Result<(), ConnectorError> {
        let Some(token) = self.token.lock().await.take() else {
            return Ok(());
        };

        let response = self
            .http
            .post(format!("{}/session?delete=true", self.base_url))
            .headers(self.session_headers(&token)?)
            .send()
            .await?;
        let response: ApiResponse<Value> = read_json(response).await?;
        if !response.success {
            return Err(ConnectorError::ConnectionFailed(format!(
                "failed to close session: {}",
                response.failure_message()
            )));
        }

        info!("Snowflake session closed");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

/// `https://<account>.snowflakecomputing.com` unless `host` overrides it.
pub fn base_url(cfg: &SnowflakeConfig) -> std::result::Result<String, ConnectorError> {
    let raw = match cfg.host.as_deref().filter(|h| !h.is_empty()) {
        Some(h) if h.starts_with("http://") || h.starts_with("https://") => h.to_string(),
        Some(h) => format!("https://{}", h),
        None => format!(
            "https://{}.snowflakecomputing.com",
            cfg.account.replace('_', "-")
        ),
    };
    let url = Url::parse(&raw)
        .map_err(|e| ConnectorError::ConnectionFailed(format!("invalid host '{}': {}", raw, e)))?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}

fn user_agent() -> &'static str {
    concat!("semlayer/", env!("CARGO_PKG_VERSION"))
}

fn client_fields(cfg: &SnowflakeConfig) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("CLIENT_APP_ID".into(), json!(CLIENT_APP_ID));
    data.insert("CLIENT_APP_VERSION".into(), json!(CLIENT_APP_VERSION));
    data.insert("ACCOUNT_NAME".into(), json!(account_identifier(&cfg.account)));
    data.insert("LOGIN_NAME".into(), json!(cfg.user));
    data
}

async fn login(
    http: &reqwest::Client,
    base_url: &str,
    cfg: &SnowflakeConfig,
    mode: &AuthMode,
) -> std::result::Result<String, ConnectorError> {
    let mut data = client_fields(cfg);
    data.insert(
        "CLIENT_ENVIRONMENT".into(),
        json!({ "APPLICATION": "semlayer", "OS": std::env::consts::OS }),
    );
    data.insert(
        "SESSION_PARAMETERS".into(),
        json!({ "GO_QUERY_RESULT_FORMAT": "json" }),
    );

    match mode {
        AuthMode::Password { password } => {
            data.insert("PASSWORD".into(), json!(password));
            insert_passcode(&mut data, cfg);
        }
        AuthMode::KeyPair {
            private_key_path,
            passphrase,
        } => {
            let pair = KeyPair::from_file(private_key_path, passphrase.as_deref())?;
            debug!("Using public key fingerprint {}", pair.fingerprint());
            let jwt = pair.login_jwt(&cfg.account, &cfg.user, Utc::now())?;
            data.insert("AUTHENTICATOR".into(), json!("SNOWFLAKE_JWT"));
            data.insert("TOKEN".into(), json!(jwt));
        }
        AuthMode::Token {
            token,
            authenticator,
        } => {
            let authenticator = authenticator.as_deref().unwrap_or("oauth").to_uppercase();
            data.insert("AUTHENTICATOR".into(), json!(authenticator));
            data.insert("TOKEN".into(), json!(token));
        }
        AuthMode::Authenticator {
            authenticator,
            password,
        } => {
            if is_okta_url(authenticator) {
                let password = password.as_deref().ok_or_else(|| {
                    ConnectorError::AuthFailed(
                        "native SSO authentication requires snowflake.password".to_string(),
                    )
                })?;
                let saml =
                    okta_saml_response(http, base_url, cfg, authenticator, password).await?;
                data.insert("AUTHENTICATOR".into(), json!(authenticator));
                data.insert("RAW_SAML_RESPONSE".into(), json!(saml));
            } else {
                data.insert("AUTHENTICATOR".into(), json!(authenticator.to_uppercase()));
                if let Some(password) = password {
                    data.insert("PASSWORD".into(), json!(password));
                }
                insert_passcode(&mut data, cfg);
            }
        }
    }

    let mut url = Url::parse(&format!("{}/session/v1/login-request", base_url))
        .map_err(|e| ConnectorError::ConnectionFailed(e.to_string()))?;
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in [
            ("databaseName", &cfg.database),
            ("schemaName", &cfg.schema),
            ("warehouse", &cfg.warehouse),
            ("roleName", &cfg.role),
        ] {
            if let Some(value) = value {
                query.append_pair(key, value);
            }
        }
        query.append_pair("requestId", &Uuid::new_v4().to_string());
    }

    let response = http
        .post(url)
        .header(ACCEPT, "application/json")
        .header(USER_AGENT, user_agent())
        .json(&json!({ "data": data }))
        .send()
        .await
        .map_err(|e| ConnectorError::ConnectionFailed(e.to_string()))?;

    let response: ApiResponse<LoginData> = read_json(response).await?;
    if !response.success {
        return Err(ConnectorError::AuthFailed(response.failure_message()));
    }
    response
        .data
        .map(|d| d.token)
        .ok_or_else(|| ConnectorError::Protocol("login response without a token".to_string()))
}

fn insert_passcode(data: &mut Map<String, Value>, cfg: &SnowflakeConfig) {
    if let Some(passcode) = cfg.passcode.as_deref().filter(|p| !p.is_empty()) {
        data.insert("EXT_AUTHN_DUO_METHOD".into(), json!("passcode"));
        data.insert("PASSCODE".into(), json!(passcode));
    }
}

async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> std::result::Result<T, ConnectorError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ConnectorError::QueryFailed(format!("HTTP {}: {}", status, body)));
    }
    serde_json::from_str(&body)
        .map_err(|e| ConnectorError::Protocol(format!("cannot decode response: {}", e)))
}

// ---------------------------------------------------------------------------
// Native SSO (Okta)
// ---------------------------------------------------------------------------

/// Authenticators given as a URL name a native SSO identity provider.
fn is_okta_url(authenticator: &str) -> bool {
    Url::parse(authenticator)
        .map(|u| matches!(u.scheme(), "https" | "http"))
        .unwrap_or(false)
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}

async fn okta_saml_response(
    http: &reqwest::Client,
    base_url: &str,
    cfg: &SnowflakeConfig,
    okta_url: &str,
    password: &str,
) -> std::result::Result<String, ConnectorError> {
    let sso_failed = |msg: String| ConnectorError::AuthFailed(format!("native SSO: {}", msg));

    // Step 1: ask the warehouse for the IdP token and SSO endpoints.
    let mut data = client_fields(cfg);
    data.insert("AUTHENTICATOR".into(), json!(okta_url));
    let response = http
        .post(format!("{}/session/authenticator-request", base_url))
        .header(ACCEPT, "application/json")
        .json(&json!({ "data": data }))
        .send()
        .await?;
    let response: ApiResponse<AuthenticatorData> = read_json(response).await?;
    if !response.success {
        return Err(sso_failed(response.failure_message()));
    }
    let endpoints = response
        .data
        .ok_or_else(|| sso_failed("authenticator response without data".to_string()))?;

    let idp = Url::parse(okta_url).map_err(|e| sso_failed(e.to_string()))?;
    let token_url = Url::parse(&endpoints.token_url).map_err(|e| sso_failed(e.to_string()))?;
    let sso_url = Url::parse(&endpoints.sso_url).map_err(|e| sso_failed(e.to_string()))?;
    if !same_origin(&idp, &token_url) || !same_origin(&idp, &sso_url) {
        return Err(sso_failed(
            "IdP endpoints do not match the configured authenticator".to_string(),
        ));
    }

    // Step 2: exchange credentials for a one-time token.
    let response = http
        .post(token_url)
        .header(ACCEPT, "application/json")
        .json(&json!({ "username": cfg.user, "password": password }))
        .send()
        .await?;
    let body: Value = read_json(response).await?;
    let one_time_token = body
        .get("sessionToken")
        .or_else(|| body.get("cookieToken"))
        .and_then(Value::as_str)
        .ok_or_else(|| sso_failed("IdP did not return a session token".to_string()))?
        .to_string();

    // Step 3: fetch the SAML form and check it posts back to this account.
    let mut sso_url = sso_url;
    sso_url
        .query_pairs_mut()
        .append_pair("RelayState", "/some/deep/link")
        .append_pair("onetimetoken", &one_time_token);
    let response = http.get(sso_url).header(ACCEPT, "*/*").send().await?;
    if !response.status().is_success() {
        return Err(sso_failed(format!("SSO request failed ({})", response.status())));
    }
    let html = response.text().await?;

    let action = form_action(&html)
        .ok_or_else(|| sso_failed("SAML response has no form action".to_string()))?;
    let action = Url::parse(&action).map_err(|e| sso_failed(e.to_string()))?;
    let base = Url::parse(base_url).map_err(|e| sso_failed(e.to_string()))?;
    if !same_origin(&action, &base) {
        warn!("SAML form posts to {}, expected {}", action, base_url);
        return Err(sso_failed(
            "SAML response does not target this account".to_string(),
        ));
    }

    Ok(html)
}

/// The unescaped `action` attribute of the first `<form>` element.
/// Tag and attribute names match case-insensitively.
fn form_action(html: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets, so positions carry over to `html`.
    let lower = html.to_ascii_lowercase();
    let form = lower.find("<form")?;
    let start = form + lower[form..].find("action=\"")? + "action=\"".len();
    let end = start + html[start..].find('"')?;
    Some(unescape_html(&html[start..end]))
}

fn unescape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').and_then(|semi| {
            let entity = &tail[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                e if e.starts_with("#x") || e.starts_with("#X") => {
                    u32::from_str_radix(&e[2..], 16).ok().and_then(char::from_u32)
                }
                e if e.starts_with('#') => e[1..].parse().ok().and_then(char::from_u32),
                _ => None,
            };
            ch.map(|c| (c, semi + 1))
        });
        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &tail[len..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_from_account() {
        let cfg = SnowflakeConfig::new("xy12345.us-east-1", "loader");
        assert_eq!(
            base_url(&cfg).unwrap(),
            "https://xy12345.us-east-1.snowflakecomputing.com"
        );
    }

    #[test]
    fn test_base_url_replaces_underscores() {
        let cfg = SnowflakeConfig::new("my_org-my_account", "loader");
        assert_eq!(
            base_url(&cfg).unwrap(),
            "https://my-org-my-account.snowflakecomputing.com"
        );
    }

    #[test]
    fn test_base_url_host_override() {
        let mut cfg = SnowflakeConfig::new("acme", "loader");
        cfg.host = Some("http://127.0.0.1:8080/".to_string());
        assert_eq!(base_url(&cfg).unwrap(), "http://127.0.0.1:8080");

        cfg.host = Some("acme.privatelink.snowflakecomputing.com".to_string());
        assert_eq!(
            base_url(&cfg).unwrap(),
            "https://acme.privatelink.snowflakecomputing.com"
        );
    }

    #[test]
    fn test_form_action_unescapes_entities() {
        let html = r#"<html><body><form method="post" action="https&#x3a;&#x2f;&#x2f;acme.snowflakecomputing.com&#x2f;fed&#x2f;login"><input name="SAMLResponse" value="abc"/></form></body></html>"#;
        assert_eq!(
            form_action(html).as_deref(),
            Some("https://acme.snowflakecomputing.com/fed/login")
        );
    }

    #[test]
    fn test_form_action_uppercase_markup() {
        let html = r#"<HTML><BODY><FORM METHOD="POST" ACTION="https://acme.snowflakecomputing.com/Fed/Login"></FORM></BODY></HTML>"#;
        assert_eq!(
            form_action(html).as_deref(),
            Some("https://acme.snowflakecomputing.com/Fed/Login")
        );
    }

    #[test]
    fn test_form_action_missing() {
        assert_eq!(form_action("<html>no form</html>"), None);
    }

    #[test]
    fn test_unescape_html_leaves_unknown_entities() {
        assert_eq!(unescape_html("a &amp; b &bogus; &#65;"), "a & b &bogus; A");
        assert_eq!(unescape_html("trailing &"), "trailing &");
    }

    #[test]
    fn test_is_okta_url() {
        assert!(is_okta_url("https://acme.okta.com"));
        assert!(!is_okta_url("externalbrowser"));
        assert!(!is_okta_url("username_password_mfa"));
    }

    #[test]
    fn test_failure_message() {
        let response: ApiResponse<Value> = serde_json::from_str(
            r#"{"data":null,"code":"390100","message":"Incorrect username or password was specified.","success":false}"#,
        )
        .unwrap();
        assert_eq!(
            response.failure_message(),
            "Incorrect username or password was specified. (code 390100)"
        );
    }
}
