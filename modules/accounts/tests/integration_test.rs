use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Extension, Router,
};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tower::ServiceExt;

use accounts::{
    contract::Registration,
    domain::{
        error::DomainError,
        service::{Service, ServiceConfig},
    },
    infra::storage::{migrations::Migrator, SeaOrmUsersRepository},
};
use httpkit::{Session, SessionStore};

/// Fresh in-memory database; one connection so every query sees the same database.
async fn create_test_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opts)
        .await
        .expect("Failed to connect to test database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}

async fn create_test_service() -> Arc<Service> {
    let db = create_test_db().await;
    let config = ServiceConfig {
        bcrypt_cost: 4,
        ..Default::default()
    };
    Arc::new(Service::new(
        Arc::new(SeaOrmUsersRepository::new(db)),
        config,
    ))
}

fn registration(name: &str, email: &str, password: &str) -> Registration {
    Registration {
        name: name.into(),
        email: email.into(),
        password: password.into(),
        password1: password.into(),
    }
}

#[tokio::test]
async fn register_then_authenticate() -> Result<()> {
    let service = create_test_service().await;

    let user = service
        .register(registration(" Ada ", "Ada@Example.com", "s3cret-pass"))
        .await?;
    assert_eq!(user.name, "Ada");
    assert_eq!(user.email, "ada@example.com");

    let authed = service.authenticate("ADA@example.com ", "s3cret-pass").await?;
    assert_eq!(authed.id, user.id);

    Ok(())
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() {
    let service = create_test_service().await;
    service
        .register(registration("Ada", "ada@example.com", "s3cret-pass"))
        .await
        .unwrap();

    let wrong = service
        .authenticate("ada@example.com", "not-the-pass")
        .await
        .unwrap_err();
    let unknown = service
        .authenticate("bob@example.com", "s3cret-pass")
        .await
        .unwrap_err();

    assert!(matches!(wrong, DomainError::InvalidCredentials));
    assert!(matches!(unknown, DomainError::InvalidCredentials));
    assert_eq!(wrong.to_string(), unknown.to_string());
}

#[tokio::test]
async fn registration_validation_reports_all_fields() {
    let service = create_test_service().await;

    let err = service
        .register(Registration {
            name: "   ".into(),
            email: "not-an-email".into(),
            password: "short".into(),
            password1: "short".into(),
        })
        .await
        .unwrap_err();

    let DomainError::Validation { errors } = err else {
        panic!("expected validation error, got {err:?}");
    };
    assert!(errors.has("name"));
    assert!(errors.has("email"));
    assert!(errors.has("password"));
}

#[tokio::test]
async fn mismatched_confirmation_is_rejected() {
    let service = create_test_service().await;
    let err = service
        .register(Registration {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password: "s3cret-pass".into(),
            password1: "s3cret-pasS".into(),
        })
        .await
        .unwrap_err();
    let DomainError::Validation { errors } = err else {
        panic!("expected validation error");
    };
    assert!(errors.has("password1"));
}

#[tokio::test]
async fn duplicate_email_is_a_field_error() {
    let service = create_test_service().await;
    service
        .register(registration("Ada", "ada@example.com", "s3cret-pass"))
        .await
        .unwrap();

    let err = service
        .register(registration("Other", "ADA@example.com", "another-pass"))
        .await
        .unwrap_err();
    let DomainError::Validation { errors } = err else {
        panic!("expected validation error");
    };
    assert!(errors.has("email"));
}

// ---- web layer ----

fn test_router(service: Arc<Service>, session: Session) -> Router {
    accounts::api::web::routes::register_routes(Router::new(), service).layer(Extension(session))
}

fn form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(resp: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn register_logs_on_and_redirects_home() {
    let service = create_test_service().await;
    let store = SessionStore::new(Duration::from_secs(60));
    let session = store.create();
    let token_before = session.csrf_token();

    let resp = test_router(service, session.clone())
        .oneshot(form(
            "/sessions/register",
            "name=Ada&email=ada%40example.com&password=s3cret-pass&password1=s3cret-pass",
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()[header::LOCATION], "/");
    assert_eq!(session.user().map(|u| u.name), Some("Ada".to_string()));
    assert_ne!(session.csrf_token(), token_before);
}

#[tokio::test]
async fn invalid_registration_rerenders_with_422() {
    let service = create_test_service().await;
    let store = SessionStore::new(Duration::from_secs(60));
    let session = store.create();

    let resp = test_router(service, session.clone())
        .oneshot(form(
            "/sessions/register",
            "name=Ada&email=ada%40example.com&password=short&password1=short",
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let page = body_string(resp).await;
    assert!(page.contains("Password must be at least 8 characters"));
    assert!(page.contains(r#"value="ada@example.com""#));
    assert!(session.user().is_none());
}

#[tokio::test]
async fn bad_logon_flashes_and_redirects_back() {
    let service = create_test_service().await;
    let store = SessionStore::new(Duration::from_secs(60));
    let session = store.create();

    let resp = test_router(service, session.clone())
        .oneshot(form(
            "/sessions/logon",
            "email=nobody%40example.com&password=whatever1",
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()[header::LOCATION], "/sessions/logon");
    let flash = session.take_flash();
    assert_eq!(flash.len(), 1);
    assert_eq!(flash[0].message, "Incorrect email or password.");
}

#[tokio::test]
async fn logon_then_logoff() {
    let service = create_test_service().await;
    service
        .register(registration("Ada", "ada@example.com", "s3cret-pass"))
        .await
        .unwrap();
    let store = SessionStore::new(Duration::from_secs(60));
    let session = store.create();
    let app = test_router(service, session.clone());

    let resp = app
        .clone()
        .oneshot(form(
            "/sessions/logon",
            "email=ada%40example.com&password=s3cret-pass",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert!(session.user().is_some());

    let resp = app
        .clone()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(body_string(resp).await.contains("Welcome back, Ada."));

    let resp = app
        .oneshot(form("/sessions/logoff", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert!(session.user().is_none());
}
