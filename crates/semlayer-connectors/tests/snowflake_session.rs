//! Snowflake session tests against a local HTTP stub of the session endpoints.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use semlayer_config::SnowflakeConfig;
use semlayer_connectors::{ConnectorError, SnowflakeSession, WarehouseSession};
use semlayer_core::SemlayerError;

const SESSION_TOKEN: &str = "session-token-1";

#[derive(Default)]
struct Stub {
    base: String,
    logins: Mutex<Vec<Value>>,
    login_params: Mutex<Vec<HashMap<String, String>>>,
    queries: Mutex<Vec<Value>>,
    auth_headers: Mutex<Vec<String>>,
    deletes: AtomicUsize,
    sso_tokens: Mutex<Vec<String>>,
}

// --- Handlers ---

async fn login(
    State(stub): State<Arc<Stub>>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    stub.login_params.lock().unwrap().push(params);
    let data = body["data"].clone();
    stub.logins.lock().unwrap().push(data.clone());

    if data["PASSWORD"] == "wrong" {
        return Json(json!({
            "data": null,
            "code": "390100",
            "message": "Incorrect username or password was specified.",
            "success": false
        }));
    }
    Json(json!({
        "data": { "token": SESSION_TOKEN, "masterToken": "master-1" },
        "code": null,
        "message": null,
        "success": true
    }))
}

async fn query_request(
    State(stub): State<Arc<Stub>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    stub.auth_headers.lock().unwrap().push(auth);
    stub.queries.lock().unwrap().push(body.clone());

    let sql = body["sqlText"].as_str().unwrap_or_default();
    let response = if sql.contains("SLOW") {
        json!({
            "data": { "getResultUrl": "/queries/q-slow/result", "queryId": "q-slow" },
            "code": "333334",
            "message": "Asynchronous execution in progress.",
            "success": true
        })
    } else if sql.contains("BROKEN") {
        json!({
            "data": { "errorCode": "002003" },
            "code": "002003",
            "message": "SQL compilation error: Object 'BROKEN' does not exist.",
            "success": false
        })
    } else if sql.contains("CHUNKED") {
        json!({
            "data": {
                "rowtype": [{ "name": "N" }],
                "rowset": [["1"]],
                "chunks": [{ "url": format!("{}/chunks/0", stub.base), "rowCount": 2 }],
                "chunkHeaders": { "x-test-chunk": "yes" },
                "queryResultFormat": "json"
            },
            "success": true
        })
    } else if sql.contains("ARROW") {
        json!({
            "data": { "rowsetBase64": "", "queryResultFormat": "arrow" },
            "success": true
        })
    } else {
        json!({
            "data": {
                "rowtype": [{ "name": "COLUMN_NAME" }, { "name": "DATA_TYPE" }],
                "rowset": [["ID", "NUMBER"], ["NOTE", null]],
                "queryResultFormat": "json"
            },
            "success": true
        })
    };
    Json(response)
}

async fn slow_result() -> Json<Value> {
    Json(json!({
        "data": {
            "rowtype": [{ "name": "STATUS" }],
            "rowset": [["done"]],
            "queryResultFormat": "json"
        },
        "success": true
    }))
}

async fn chunk(headers: HeaderMap) -> (StatusCode, String) {
    if headers.get("x-test-chunk").and_then(|v| v.to_str().ok()) == Some("yes") {
        (StatusCode::OK, r#"["2"],["3"]"#.to_string())
    } else {
        (StatusCode::FORBIDDEN, "missing chunk header".to_string())
    }
}

async fn delete_session(
    State(stub): State<Arc<Stub>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    if params.get("delete").map(String::as_str) == Some("true") {
        stub.deletes.fetch_add(1, Ordering::SeqCst);
    }
    Json(json!({ "data": null, "success": true }))
}

async fn authenticator_request(State(stub): State<Arc<Stub>>) -> Json<Value> {
    Json(json!({
        "data": {
            "tokenUrl": format!("{}/okta/api/v1/authn", stub.base),
            "ssoUrl": format!("{}/okta/app/snowflake/sso/saml", stub.base)
        },
        "success": true
    }))
}

async fn okta_authn(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["username"] == "loader" && body["password"] == "okta-secret" {
        (StatusCode::OK, Json(json!({ "sessionToken": "ott-123" })))
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "errorCode": "E0000004" })))
    }
}

async fn okta_sso(
    State(stub): State<Arc<Stub>>,
    Query(params): Query<HashMap<String, String>>,
) -> String {
    stub.sso_tokens
        .lock()
        .unwrap()
        .push(params.get("onetimetoken").cloned().unwrap_or_default());
    let action = format!("{}/fed/login", stub.base)
        .replace(':', "&#x3a;")
        .replace('/', "&#x2f;");
    format!(
        r#"<html><body><form id="appForm" action="{action}" method="POST"><input name="SAMLResponse" type="hidden" value="PHNhbWw+"/></form></body></html>"#
    )
}

async fn spawn_stub() -> Arc<Stub> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let stub = Arc::new(Stub {
        base,
        ..Default::default()
    });

    let app = Router::new()
        .route("/session/v1/login-request", post(login))
        .route("/queries/v1/query-request", post(query_request))
        .route("/queries/q-slow/result", get(slow_result))
        .route("/chunks/0", get(chunk))
        .route("/session", post(delete_session))
        .route("/session/authenticator-request", post(authenticator_request))
        .route("/okta/api/v1/authn", post(okta_authn))
        .route("/okta/app/snowflake/sso/saml", get(okta_sso))
        .with_state(stub.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    stub
}

fn config(stub: &Stub) -> SnowflakeConfig {
    let mut cfg = SnowflakeConfig::new("acme", "loader");
    cfg.host = Some(stub.base.clone());
    cfg
}

fn password_config(stub: &Stub) -> SnowflakeConfig {
    let mut cfg = config(stub);
    cfg.password = Some("secret".to_string());
    cfg.warehouse = Some("COMPUTE_WH".to_string());
    cfg.role = Some("ANALYST".to_string());
    cfg
}

// --- Login ---

#[tokio::test]
async fn test_password_login_sends_credentials_and_context() {
    let stub = spawn_stub().await;
    let session = SnowflakeSession::connect(&password_config(&stub))
        .await
        .unwrap();
    assert_eq!(session.base_url(), stub.base);

    let logins = stub.logins.lock().unwrap().clone();
    assert_eq!(logins.len(), 1);
    assert_eq!(logins[0]["ACCOUNT_NAME"], "ACME");
    assert_eq!(logins[0]["LOGIN_NAME"], "loader");
    assert_eq!(logins[0]["PASSWORD"], "secret");
    assert!(logins[0].get("AUTHENTICATOR").is_none());

    let params = stub.login_params.lock().unwrap()[0].clone();
    assert_eq!(params.get("warehouse").map(String::as_str), Some("COMPUTE_WH"));
    assert_eq!(params.get("roleName").map(String::as_str), Some("ANALYST"));
    assert!(params.contains_key("requestId"));
    assert!(!params.contains_key("databaseName"));
}

#[tokio::test]
async fn test_password_login_with_passcode() {
    let stub = spawn_stub().await;
    let mut cfg = password_config(&stub);
    cfg.passcode = Some("123456".to_string());
    SnowflakeSession::connect(&cfg).await.unwrap();

    let login = stub.logins.lock().unwrap()[0].clone();
    assert_eq!(login["PASSCODE"], "123456");
    assert_eq!(login["EXT_AUTHN_DUO_METHOD"], "passcode");
}

#[tokio::test]
async fn test_rejected_credentials_are_connection_errors() {
    let stub = spawn_stub().await;
    let mut cfg = config(&stub);
    cfg.password = Some("wrong".to_string());

    match SnowflakeSession::connect(&cfg).await {
        Err(SemlayerError::Connection(e)) => {
            assert!(e.to_string().contains("Incorrect username or password"))
        }
        other => panic!("expected Connection error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_key_pair_login_sends_signed_jwt() {
    let stub = spawn_stub().await;
    let mut cfg = config(&stub);
    cfg.private_key_path = Some(format!(
        "{}/tests/fixtures/rsa_key_encrypted.p8",
        env!("CARGO_MANIFEST_DIR")
    ));
    cfg.private_key_passphrase = Some("fixture-pass".to_string());
    SnowflakeSession::connect(&cfg).await.unwrap();

    let login = stub.logins.lock().unwrap()[0].clone();
    assert_eq!(login["AUTHENTICATOR"], "SNOWFLAKE_JWT");
    assert!(login.get("PASSWORD").is_none());
    let token = login["TOKEN"].as_str().unwrap();
    assert_eq!(token.split('.').count(), 3);
}

#[tokio::test]
async fn test_oauth_token_login() {
    let stub = spawn_stub().await;
    let mut cfg = config(&stub);
    cfg.token = Some("oauth-access-token".to_string());
    SnowflakeSession::connect(&cfg).await.unwrap();

    let login = stub.logins.lock().unwrap()[0].clone();
    assert_eq!(login["AUTHENTICATOR"], "OAUTH");
    assert_eq!(login["TOKEN"], "oauth-access-token");
}

#[tokio::test]
async fn test_native_sso_login_posts_saml_response() {
    let stub = spawn_stub().await;
    let mut cfg = config(&stub);
    cfg.authenticator = Some(format!("{}/okta", stub.base));
    cfg.password = Some("okta-secret".to_string());
    SnowflakeSession::connect(&cfg).await.unwrap();

    assert_eq!(stub.sso_tokens.lock().unwrap().clone(), vec!["ott-123"]);
    let login = stub.logins.lock().unwrap()[0].clone();
    assert!(login["RAW_SAML_RESPONSE"]
        .as_str()
        .unwrap()
        .contains("SAMLResponse"));
    assert!(login.get("PASSWORD").is_none());
}

#[tokio::test]
async fn test_external_browser_is_rejected_without_network() {
    let stub = spawn_stub().await;
    let mut cfg = config(&stub);
    cfg.authenticator = Some("externalbrowser".to_string());

    assert!(matches!(
        SnowflakeSession::connect(&cfg).await,
        Err(SemlayerError::Connection(_))
    ));
    assert!(stub.logins.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_conflicting_modes_are_rejected_without_network() {
    let stub = spawn_stub().await;
    let mut cfg = password_config(&stub);
    cfg.token = Some("tok".to_string());

    assert!(matches!(
        SnowflakeSession::connect(&cfg).await,
        Err(SemlayerError::ConflictingAuthentication(_))
    ));
    assert!(stub.logins.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_host_is_connection_error() {
    let mut cfg = SnowflakeConfig::new("acme", "loader");
    cfg.password = Some("secret".to_string());
    cfg.host = Some("http://127.0.0.1:1".to_string());

    assert!(matches!(
        SnowflakeSession::connect(&cfg).await,
        Err(SemlayerError::Connection(_))
    ));
}

// --- Queries ---

#[tokio::test]
async fn test_query_returns_rows_and_sends_session_token() {
    let stub = spawn_stub().await;
    let session = SnowflakeSession::connect(&password_config(&stub))
        .await
        .unwrap();

    let result = session.query("SELECT 1").await.unwrap();
    assert_eq!(result.columns, vec!["COLUMN_NAME", "DATA_TYPE"]);
    assert_eq!(result.rows[1], vec![Some("NOTE".to_string()), None]);

    session.query("SELECT 2").await.unwrap();
    let queries = stub.queries.lock().unwrap().clone();
    assert_eq!(queries[0]["sequenceId"], 1);
    assert_eq!(queries[1]["sequenceId"], 2);
    assert_eq!(queries[0]["asyncExec"], false);
    assert_eq!(
        stub.auth_headers.lock().unwrap()[0],
        format!("Snowflake Token=\"{}\"", SESSION_TOKEN)
    );
}

#[tokio::test]
async fn test_in_progress_query_is_polled() {
    let stub = spawn_stub().await;
    let session = SnowflakeSession::connect(&password_config(&stub))
        .await
        .unwrap();

    let result = session.query("CALL SLOW_PROC()").await.unwrap();
    assert_eq!(result.scalar(), Some("done"));
}

#[tokio::test]
async fn test_failed_query_surfaces_server_message() {
    let stub = spawn_stub().await;
    let session = SnowflakeSession::connect(&password_config(&stub))
        .await
        .unwrap();

    match session.query("SELECT * FROM BROKEN").await {
        Err(ConnectorError::QueryFailed(msg)) => {
            assert!(msg.contains("does not exist"));
            assert!(msg.contains("002003"));
        }
        other => panic!("expected QueryFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_chunked_results_are_appended() {
    let stub = spawn_stub().await;
    let session = SnowflakeSession::connect(&password_config(&stub))
        .await
        .unwrap();

    let result = session.query("SELECT CHUNKED").await.unwrap();
    assert_eq!(result.column_values(0), vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_arrow_results_are_rejected() {
    let stub = spawn_stub().await;
    let session = SnowflakeSession::connect(&password_config(&stub))
        .await
        .unwrap();

    assert!(matches!(
        session.query("SELECT ARROW").await,
        Err(ConnectorError::Protocol(_))
    ));
}

// --- Close ---

#[tokio::test]
async fn test_close_deletes_session_once() {
    let stub = spawn_stub().await;
    let session = SnowflakeSession::connect(&password_config(&stub))
        .await
        .unwrap();

    session.close().await.unwrap();
    session.close().await.unwrap();
    assert_eq!(stub.deletes.load(Ordering::SeqCst), 1);

    assert!(matches!(
        session.query("SELECT 1").await,
        Err(ConnectorError::Closed)
    ));
}
