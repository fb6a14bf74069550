//! Pruebas de extremo a extremo del router HTTP con ATM y UMLS simulados.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Path, Query},
    http::{header, Method, Request, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use mesh_suggester::{
    api::{self, NOT_FOUND_BODY},
    app_state::AppState,
    atm::AtmClient,
    backend::Backends,
    config::AppConfig,
    embedding::ModelState,
    umls::UmlsClient,
};

/// Simula `esearch`: traducciones fijas por término, `boom` devuelve 500.
async fn fake_esearch(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    let term = params.get("term").map(String::as_str).unwrap_or_default();
    let to = match term {
        "insulin" => Some(r#""insulin"[MeSH Terms] OR "insulin"[All Fields] OR "insulins"[MeSH Terms]"#),
        "diabetes" => Some(r#""diabetes mellitus"[MeSH Terms] OR "diabetes insipidus"[MeSH Terms] OR "diabetes"[All Fields]"#),
        "heart attack" => Some(r#""myocardial infarction"[MeSH Terms] OR ("heart"[All Fields] AND "attack"[All Fields])"#),
        "boom" => return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))),
        _ => None,
    };
    let translationset = match to {
        Some(to) => json!([{ "from": term, "to": to }]),
        None => json!([]),
    };
    (
        StatusCode::OK,
        Json(json!({ "esearchresult": { "count": "1", "translationset": translationset } })),
    )
}

/// Simula el índice UMLS: `insulin` tiene entradas MSH y de otras fuentes.
async fn fake_umls(Path(term): Path<String>) -> Json<Value> {
    let thesaurus = match term.as_str() {
        "insulin" => json!([
            { "MRCONSO_STR": "Insulin", "MRCONSO_SAB": "MSH" },
            { "MRCONSO_STR": "insulin preparation", "MRCONSO_SAB": "SNOMEDCT_US" },
            { "MRCONSO_STR": "Insulin, Regular, Human", "MRCONSO_SAB": "MSH" }
        ]),
        _ => json!([]),
    };
    Json(json!({ "hits": { "hits": [ { "_score": 1.0, "_source": { "thesaurus": thesaurus } } ] } }))
}

/// Servicios externos simulados; devuelve su URL base.
async fn spawn_fake_services() -> String {
    let app = Router::new()
        .route("/esearch", get(fake_esearch))
        .route("/umls/:term", get(fake_umls));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn test_app() -> Router {
    let base = spawn_fake_services().await;
    let cfg = AppConfig {
        atm_url: format!("{base}/esearch"),
        umls_url: Some(format!("{base}/umls/")),
        backend_timeout: Duration::from_secs(5),
        ..AppConfig::default()
    };
    let backends = Backends::new(
        Arc::new(ModelState::Unavailable("checkpoint no encontrado".to_string())),
        AtmClient::from_config(&cfg),
    )
    .with_umls(UmlsClient::from_config(&cfg));
    api::create_router(AppState::new(cfg, backends))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, String) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    let request = builder
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn send_json(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, text) = send(app, method, uri, body).await;
    (status, serde_json::from_str(&text).unwrap_or(Value::Null))
}

async fn new_session(app: &Router) -> String {
    let (status, body) = send_json(app, Method::POST, "/api/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    body["session_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn unknown_route_returns_fixed_not_found() {
    let app = test_app().await;
    let (status, body) = send(&app, Method::GET, "/api/v2/nothing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, NOT_FOUND_BODY);
}

#[tokio::test]
async fn responses_allow_any_origin() {
    let app = test_app().await;
    let request = Request::builder()
        .uri("/api/status")
        .header(header::ORIGIN, "http://example.org")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
}

#[tokio::test]
async fn status_lists_external_backends_without_models() {
    let app = test_app().await;
    let (status, body) = send_json(&app, Method::GET, "/api/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_loaded"], false);
    assert_eq!(body["model_error"], "checkpoint no encontrado");
    assert_eq!(body["backends"], json!(["ATM", "UMLS"]));
}

#[tokio::test]
async fn legacy_mesh_endpoint_with_atm() {
    let app = test_app().await;
    let (status, body) = send_json(
        &app,
        Method::GET,
        "/api/v1/resources/mesh?term=insulin$heart%20attack$zzz&type=ATM",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Splits"], json!(["insulin", "heart attack", "zzz"]));
    let data = body["Data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["type"], "ATM");
    assert_eq!(data[0]["Keywords"], json!(["insulin"]));
    assert_eq!(data[0]["MeSH_Terms"], json!({ "0": "insulin", "1": "insulins" }));
    assert_eq!(data[1]["MeSH_Terms"]["0"], "myocardial infarction");
}

#[tokio::test]
async fn legacy_mesh_endpoint_with_umls() {
    let app = test_app().await;
    let (status, body) = send_json(
        &app,
        Method::GET,
        "/api/v1/resources/mesh?term=insulin$zzz&type=UMLS",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = body["Data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["type"], "UMLS");
    assert_eq!(
        data[0]["MeSH_Terms"],
        json!({ "0": "Insulin", "1": "Insulin, Regular, Human" })
    );
    assert_eq!(data[1]["Keywords"], json!(["zzz"]));
    assert_eq!(data[1]["MeSH_Terms"], json!({}));
}

#[tokio::test]
async fn shutdown_is_not_exposed_over_http() {
    let app = test_app().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/shutdown")
        .header(header::ORIGIN, "http://evil.example")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let (status, _) = send_json(&app, Method::GET, "/api/status", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn legacy_mesh_endpoint_errors() {
    let app = test_app().await;

    let (status, body) =
        send_json(&app, Method::GET, "/api/v1/resources/mesh?term=insulin&type=Semantic", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["kind"], "model_unavailable");

    let (status, body) =
        send_json(&app, Method::GET, "/api/v1/resources/mesh?term=insulin&type=MetaMap", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "unknown_backend");

    let (status, _) = send_json(&app, Method::GET, "/api/v1/resources/mesh?type=ATM", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) =
        send_json(&app, Method::GET, "/api/v1/resources/mesh?term=boom&type=ATM", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["kind"], "backend_call_failure");
}

#[tokio::test]
async fn session_parse_suggest_add_clear() {
    let app = test_app().await;
    let id = new_session(&app).await;

    let (status, body) = send_json(
        &app,
        Method::POST,
        &format!("/api/sessions/{id}/parse"),
        Some(json!({ "query": r#"(insulin OR diabetes) AND ("heart attack" OR zzz) AND NOT boom"# })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["groups"],
        json!([["insulin", "diabetes"], ["heart attack", "zzz"]])
    );

    let (status, body) = send_json(
        &app,
        Method::POST,
        &format!("/api/sessions/{id}/suggest"),
        Some(json!({ "method": "ATM" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["results"][0]["terms"],
        json!(["insulin", "insulins", "diabetes mellitus", "diabetes insipidus"])
    );
    assert_eq!(body["results"][1]["terms"], json!(["myocardial infarction"]));
    assert_eq!(body["choices"][4]["label"], "[G2]  myocardial infarction");
    assert_eq!(body["choices"][4]["key"], "1::myocardial infarction");

    let (status, body) = send_json(
        &app,
        Method::POST,
        &format!("/api/sessions/{id}/builder/add"),
        Some(json!({ "selected": [
            "[G2]  myocardial infarction",
            "[G1]  insulin",
            "[G1]  diabetes mellitus",
            "[G7]  desconocido"
        ] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["query"],
        r#"("insulin"[MeSH Terms] OR "diabetes mellitus"[MeSH Terms]) AND "myocardial infarction"[MeSH Terms]"#
    );

    let (status, body) = send_json(
        &app,
        Method::POST,
        &format!("/api/sessions/{id}/builder/add"),
        Some(json!({ "selected": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["query"].as_str().unwrap().ends_with(r#"AND "myocardial infarction"[MeSH Terms]"#));

    let (status, body) =
        send_json(&app, Method::POST, &format!("/api/sessions/{id}/clear"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "");
    assert_eq!(body["groups"], json!([]));
    assert_eq!(body["suggestions"]["choices"], json!([]));
    assert_eq!(body["builder"], "");
}

#[tokio::test]
async fn failed_group_discards_all_choices() {
    let app = test_app().await;
    let id = new_session(&app).await;

    send_json(
        &app,
        Method::POST,
        &format!("/api/sessions/{id}/parse"),
        Some(json!({ "query": "insulin" })),
    )
    .await;
    let (status, _) = send_json(
        &app,
        Method::POST,
        &format!("/api/sessions/{id}/suggest"),
        Some(json!({ "method": "ATM" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    send_json(
        &app,
        Method::POST,
        &format!("/api/sessions/{id}/parse"),
        Some(json!({ "query": "insulin AND boom" })),
    )
    .await;
    let (status, body) = send_json(
        &app,
        Method::POST,
        &format!("/api/sessions/{id}/suggest"),
        Some(json!({ "method": "ATM" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["kind"], "backend_call_failure");

    let (_, session) = send_json(&app, Method::GET, &format!("/api/sessions/{id}"), None).await;
    assert_eq!(session["suggestions"]["results"], json!([]));
    assert_eq!(session["suggestions"]["choices"], json!([]));
}

#[tokio::test]
async fn embedding_method_without_models_fails_fast() {
    let app = test_app().await;
    let id = new_session(&app).await;
    send_json(
        &app,
        Method::POST,
        &format!("/api/sessions/{id}/parse"),
        Some(json!({ "query": "insulin" })),
    )
    .await;

    let (status, body) = send_json(
        &app,
        Method::POST,
        &format!("/api/sessions/{id}/suggest"),
        Some(json!({ "method": "Semantic-BERT" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("checkpoint no encontrado"));

    let (status, _) = send_json(
        &app,
        Method::POST,
        &format!("/api/sessions/{id}/suggest"),
        Some(json!({ "method": "MetaMap" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn suggest_without_groups_is_empty() {
    let app = test_app().await;
    let id = new_session(&app).await;

    let (status, body) = send_json(
        &app,
        Method::POST,
        &format!("/api/sessions/{id}/suggest"),
        Some(json!({ "method": "Semantic" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "results": [], "choices": [] }));
}

#[tokio::test]
async fn builder_can_be_edited_directly() {
    let app = test_app().await;
    let id = new_session(&app).await;

    let (status, _) = send_json(
        &app,
        Method::PUT,
        &format!("/api/sessions/{id}/builder"),
        Some(json!({ "query": "asthma[tiab]" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send_json(&app, Method::GET, &format!("/api/sessions/{id}/builder"), None).await;
    assert_eq!(body["query"], "asthma[tiab]");
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let app = test_app().await;
    let missing = uuid::Uuid::new_v4();

    let (status, body) = send_json(
        &app,
        Method::POST,
        &format!("/api/sessions/{missing}/parse"),
        Some(json!({ "query": "insulin" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "session_not_found");

    let id = new_session(&app).await;
    let (status, _) = send(&app, Method::DELETE, &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::GET, &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
