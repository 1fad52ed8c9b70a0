#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use tower::ServiceExt;

use ticket_engine::{
    routes::build_router, services::state_machine::TicketStateMachine, AppState,
};

/// Set up an in-memory database with the full schema.
///
/// A single pooled connection keeps every query on the same in-memory database.
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

pub struct TestApp {
    pub router: Router,
    pub db: DatabaseConnection,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(TicketStateMachine::default(), |state| state).await
}

pub async fn spawn_app_with<F>(state_machine: TicketStateMachine, customize: F) -> TestApp
where
    F: FnOnce(AppState) -> AppState,
{
    let db = setup_test_db().await.expect("Failed to set up test DB");
    let state = customize(AppState::new(db.clone(), state_machine, "D"));
    TestApp {
        router: build_router(state),
        db,
    }
}

/// Identity headers forwarded by the gateway
#[derive(Debug, Clone)]
pub struct Caller {
    headers: Vec<(&'static str, String)>,
}

impl Caller {
    pub fn staff() -> Self {
        Self {
            headers: vec![
                ("x-user-id", "1".to_string()),
                ("x-user-name", "Mia Support".to_string()),
                ("x-user-role", "Staff".to_string()),
                ("x-user-department", "marketing".to_string()),
            ],
        }
    }

    pub fn dealer(user_id: i32, dealer_id: i32) -> Self {
        Self {
            headers: vec![
                ("x-user-id", user_id.to_string()),
                ("x-user-name", format!("Dealer {}", dealer_id)),
                ("x-user-role", "Dealer".to_string()),
                ("x-dealer-id", dealer_id.to_string()),
            ],
        }
    }

    pub fn anonymous() -> Self {
        Self { headers: vec![] }
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        caller: &Caller,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in &caller.headers {
            builder = builder.header(*name, value);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str, caller: &Caller) -> (StatusCode, Value) {
        self.request(Method::GET, uri, caller, None).await
    }

    pub async fn post(&self, uri: &str, caller: &Caller, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, caller, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, caller: &Caller, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, caller, Some(body)).await
    }

    /// Create a ticket as staff and return its id
    pub async fn create_ticket(&self, body: Value) -> i64 {
        let (status, json) = self.post("/tickets", &Caller::staff(), body).await;
        assert_eq!(status, StatusCode::OK, "create failed: {}", json);
        json["id"].as_i64().unwrap()
    }
}

/// Hours between two RFC 3339 timestamps in a JSON body
pub fn hours_between(from: &Value, to: &Value) -> i64 {
    let from = chrono::DateTime::parse_from_rfc3339(from.as_str().unwrap()).unwrap();
    let to = chrono::DateTime::parse_from_rfc3339(to.as_str().unwrap()).unwrap();
    (to - from).num_hours()
}
