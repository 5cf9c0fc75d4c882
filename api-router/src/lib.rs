use api_state::ApiState;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use common::utils::ingest_limits::MAX_UPLOAD_BYTES;
use middleware_api_auth::api_auth;
use routes::{
    documents::{get_dashboard, get_document, list_documents, upload_document},
    liveness::live,
    readiness::ready,
    users::{current_user, register_user, revoke_api_key, rotate_api_key},
};

pub mod api_state;
pub mod error;
mod middleware_api_auth;
mod routes;

/// Room for multipart framing on top of the largest accepted upload.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Router for API functionality, version 1
pub fn api_routes_v1<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Public, unauthenticated endpoints (k8s/systemd health checks)
    let public = Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live))
        .route("/users", post(register_user));

    // Uploads resolve their owner inside the ingestion pipeline
    let ingest = Router::new().route(
        "/documents",
        post(upload_document).layer(DefaultBodyLimit::max(
            MAX_UPLOAD_BYTES.saturating_add(MULTIPART_OVERHEAD_BYTES),
        )),
    );

    // Protected API endpoints (require auth)
    let protected = Router::new()
        .route("/documents", get(list_documents))
        .route("/documents/dashboard", get(get_dashboard))
        .route("/documents/{id}", get(get_document))
        .route("/users/me", get(current_user))
        .route(
            "/users/me/api-key",
            post(rotate_api_key).delete(revoke_api_key),
        )
        .route_layer(from_fn_with_state(app_state.clone(), api_auth));

    public.merge(ingest).merge(protected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use common::{
        storage::{
            db::SurrealDbClient,
            store::StorageManager,
            types::{document_record::DocumentRecord, user::User},
        },
        utils::config::{AppConfig, StorageKind},
    };
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    const BOUNDARY: &str = "fylex-test-boundary";

    async fn spawn_analyzer(body: &'static str) -> String {
        let app = Router::new().route(
            "/ml/service/analysis",
            post(move || async move { (StatusCode::OK, body) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind analyzer");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve analyzer");
        });
        format!("http://{addr}/ml/service/analysis")
    }

    async fn setup(analysis_service_url: String) -> (Router, Arc<SurrealDbClient>) {
        let db = Arc::new(
            SurrealDbClient::memory("api_test", &Uuid::new_v4().to_string())
                .await
                .expect("Failed to start in-memory surrealdb"),
        );
        db.ensure_initialized()
            .await
            .expect("Failed to initialize schema");

        let config = AppConfig {
            storage: StorageKind::Memory,
            analysis_service_url,
            ..Default::default()
        };
        let storage = StorageManager::new(&config)
            .await
            .expect("Failed to build storage manager");

        let state = ApiState::with_db(Arc::clone(&db), &config, storage);
        let app = Router::new()
            .nest("/api/v1", api_routes_v1(&state))
            .with_state(state);

        (app, db)
    }

    async fn user_with_key(email: &str, db: &SurrealDbClient) -> (User, String) {
        let user = User::create_new(email.to_string(), db)
            .await
            .expect("create user");
        let key = User::set_api_key(&user.id, db).await.expect("set api key");
        (user, key)
    }

    async fn store_document(owner_id: &str, name: &str, db: &SurrealDbClient) -> DocumentRecord {
        let record = DocumentRecord::new(
            name.to_string(),
            "1. Pay within ten days.\n".to_string(),
            r#"{"time":"2.0 seconds","percentage":80.0,"overall":"Low","analysis":[]}"#
                .to_string(),
            80.0,
            2.0,
            "Low".to_string(),
            owner_id.to_string(),
        );
        let stored: Option<DocumentRecord> = db.store_item(record).await.expect("store");
        stored.expect("stored record")
    }

    fn get(uri: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(key) = key {
            builder = builder.header("X-API-Key", key);
        }
        builder.body(Body::empty()).expect("request")
    }

    fn multipart(field: &str, file_name: Option<&str>, content: &str) -> String {
        let disposition = match file_name {
            Some(file_name) => {
                format!("form-data; name=\"{field}\"; filename=\"{file_name}\"")
            }
            None => format!("form-data; name=\"{field}\""),
        };
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: {disposition}\r\nContent-Type: text/plain\r\n\r\n{content}\r\n--{BOUNDARY}--\r\n"
        )
    }

    fn upload(body: String, bearer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/v1/documents")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(key) = bearer {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        builder.body(Body::from(body)).expect("request")
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn health_checks_are_public() {
        let (app, _db) = setup("http://127.0.0.1:9/unused".into()).await;

        let live = app
            .clone()
            .oneshot(get("/api/v1/live", None))
            .await
            .expect("live response");
        assert_eq!(live.status(), StatusCode::OK);

        let ready = app
            .oneshot(get("/api/v1/ready", None))
            .await
            .expect("ready response");
        assert_eq!(ready.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn document_routes_require_a_known_key() {
        let (app, _db) = setup("http://127.0.0.1:9/unused".into()).await;

        let missing = app
            .clone()
            .oneshot(get("/api/v1/documents", None))
            .await
            .expect("response");
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let unknown = app
            .oneshot(get("/api/v1/documents/dashboard", Some("sk_unknown")))
            .await
            .expect("response");
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn lists_only_the_callers_documents() {
        let (app, db) = setup("http://127.0.0.1:9/unused".into()).await;
        let (alice, alice_key) = user_with_key("alice@example.com", &db).await;
        let (bob, _) = user_with_key("bob@example.com", &db).await;
        let own = store_document(&alice.id, "lease.pdf", &db).await;
        store_document(&bob.id, "nda.docx", &db).await;

        let response = app
            .oneshot(get("/api/v1/documents", Some(&alice_key)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let previews = body.as_array().expect("array of previews");
        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0]["id"], own.id.as_str());
        assert_eq!(previews[0]["name"], "lease.pdf");
        assert_eq!(previews[0]["risk_level"], "Low");
        assert!(previews[0].get("riskLevel").is_none());
    }

    #[tokio::test]
    async fn fetching_a_document_checks_ownership() {
        let (app, db) = setup("http://127.0.0.1:9/unused".into()).await;
        let (alice, alice_key) = user_with_key("alice@example.com", &db).await;
        let (bob, _) = user_with_key("bob@example.com", &db).await;
        let own = store_document(&alice.id, "lease.pdf", &db).await;
        let foreign = store_document(&bob.id, "nda.docx", &db).await;

        let response = app
            .clone()
            .oneshot(get(&format!("/api/v1/documents/{}", own.id), Some(&alice_key)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["name"], "lease.pdf");
        assert_eq!(body["risk_level"], "Low");

        let response = app
            .clone()
            .oneshot(get(
                &format!("/api/v1/documents/{}", foreign.id),
                Some(&alice_key),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(get("/api/v1/documents/does-not-exist", Some(&alice_key)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn dashboard_summarizes_the_callers_documents() {
        let (app, db) = setup("http://127.0.0.1:9/unused".into()).await;
        let (alice, alice_key) = user_with_key("alice@example.com", &db).await;
        store_document(&alice.id, "lease.pdf", &db).await;
        store_document(&alice.id, "invoice.txt", &db).await;

        let response = app
            .oneshot(get("/api/v1/documents/dashboard", Some(&alice_key)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["total_scans"], 2);
        assert_eq!(body["clean_documents"], 2);
        assert_eq!(body["findings_detected"], 0);
        assert_eq!(body["avg_scan_time"], 2.0);
    }

    fn register(email: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/users")
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::json!({ "email": email }).to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn registered_key_opens_protected_routes() {
        let (app, _db) = setup("http://127.0.0.1:9/unused".into()).await;

        let response = app
            .clone()
            .oneshot(register("carol@example.com"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["email"], "carol@example.com");
        let key = body["api_key"].as_str().expect("api key").to_string();
        assert!(key.starts_with("sk_"));

        let me = app
            .clone()
            .oneshot(get("/api/v1/users/me", Some(&key)))
            .await
            .expect("response");
        assert_eq!(me.status(), StatusCode::OK);
        assert_eq!(json_body(me).await["email"], "carol@example.com");

        let dashboard = app
            .oneshot(get("/api/v1/documents/dashboard", Some(&key)))
            .await
            .expect("response");
        assert_eq!(dashboard.status(), StatusCode::OK);
        assert_eq!(json_body(dashboard).await["total_scans"], 0);
    }

    #[tokio::test]
    async fn registration_rejects_bad_and_duplicate_emails() {
        let (app, _db) = setup("http://127.0.0.1:9/unused".into()).await;

        let invalid = app
            .clone()
            .oneshot(register("no-at-sign"))
            .await
            .expect("response");
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let first = app
            .clone()
            .oneshot(register("dave@example.com"))
            .await
            .expect("response");
        assert_eq!(first.status(), StatusCode::CREATED);

        let duplicate = app
            .oneshot(register("dave@example.com"))
            .await
            .expect("response");
        assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rotating_and_revoking_keys() {
        let (app, db) = setup("http://127.0.0.1:9/unused".into()).await;
        let (_, old_key) = user_with_key("erin@example.com", &db).await;

        let rotate = Request::builder()
            .method("POST")
            .uri("/api/v1/users/me/api-key")
            .header("X-API-Key", &old_key)
            .body(Body::empty())
            .expect("request");
        let response = app.clone().oneshot(rotate).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let new_key = json_body(response).await["api_key"]
            .as_str()
            .expect("rotated key")
            .to_string();
        assert_ne!(new_key, old_key);

        let stale = app
            .clone()
            .oneshot(get("/api/v1/users/me", Some(&old_key)))
            .await
            .expect("response");
        assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);

        let revoke = Request::builder()
            .method("DELETE")
            .uri("/api/v1/users/me/api-key")
            .header("X-API-Key", &new_key)
            .body(Body::empty())
            .expect("request");
        let response = app.clone().oneshot(revoke).await.expect("response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let revoked = app
            .oneshot(get("/api/v1/users/me", Some(&new_key)))
            .await
            .expect("response");
        assert_eq!(revoked.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn upload_without_file_is_rejected() {
        let (app, db) = setup("http://127.0.0.1:9/unused".into()).await;
        let (_, key) = user_with_key("alice@example.com", &db).await;

        let response = app
            .oneshot(upload(multipart("note", None, "no file here"), Some(&key)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upload_with_unknown_key_is_unauthorized() {
        let (app, _db) = setup("http://127.0.0.1:9/unused".into()).await;

        let response = app
            .oneshot(upload(
                multipart("file", Some("note.txt"), "Hello world."),
                Some("sk_unknown"),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn upload_runs_the_pipeline_and_returns_the_new_id() {
        let analyzer = spawn_analyzer(
            r#"{"time":"1.5 seconds","percentage":72.5,"overall":"Medium","analysis":[{"line":1,"risk_level":"Medium","sentence":"Pay now.","type":"payment","explanation":"Short deadline"}]}"#,
        )
        .await;
        let (app, db) = setup(analyzer).await;
        let (alice, key) = user_with_key("alice@example.com", &db).await;

        let response = app
            .oneshot(upload(
                multipart("file", Some("terms.txt"), "Pay now. Read the terms."),
                Some(&key),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let id = body["id"].as_str().expect("id in response");
        let stored = DocumentRecord::find_for_owner(id, &alice.id, &db)
            .await
            .expect("stored document");
        assert_eq!(stored.name, "terms.txt");
        assert_eq!(stored.document_text, "1. Pay now.\n2. Read the terms.\n");
        assert_eq!(stored.risk_level, "Medium");
    }
}
