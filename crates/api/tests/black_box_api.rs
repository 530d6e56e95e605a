use std::sync::Arc;

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use fuelcert_api::app::{AppServices, build_router};
use fuelcert_auth::{JwtClaims, PrincipalId, Role};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod on in-memory stores, bound to an ephemeral port.
        let services = Arc::new(AppServices::in_memory(Default::default()));
        let app = build_router(services, SECRET);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, token: &str, path: &str, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).bearer_auth(token).send().await.unwrap()
    }

    async fn training(&self, token: &str, name: &str, validity: Option<i64>) -> String {
        let res = self
            .post(token, "/trainings", json!({ "name": name, "validity_period_days": validity }))
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: serde_json::Value = res.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    async fn fueler(&self, token: &str, user: PrincipalId, name: &str) -> String {
        let res = self
            .post(token, "/fuelers", json!({ "user_id": user.to_string(), "name": name }))
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: serde_json::Value = res.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(sub: PrincipalId, roles: Vec<Role>, is_staff: bool) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub,
        roles,
        is_staff,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn admin_token() -> String {
    mint_jwt(PrincipalId::new(), vec![Role::new("admin")], false)
}

fn line_token(sub: PrincipalId) -> String {
    mint_jwt(sub, vec![Role::new("fueler")], false)
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[tokio::test]
async fn health_is_public_and_protected_routes_need_a_token() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv.client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv.client.get(srv.url("/certifications")).bearer_auth("garbage").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn line_users_read_but_cannot_write() {
    let srv = TestServer::spawn().await;
    let line = line_token(PrincipalId::new());

    let res = srv.get(&line, "/trainings").await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv.post(&line, "/trainings", json!({ "name": "SPCC", "validity_period_days": 365 })).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "forbidden");

    // Staff accounts write without an admin role.
    let staff = mint_jwt(PrincipalId::new(), vec![], true);
    let res = srv.post(&staff, "/trainings", json!({ "name": "SPCC", "validity_period_days": 365 })).await;
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn whoami_reflects_token() {
    let srv = TestServer::spawn().await;
    let sub = PrincipalId::new();
    let token = mint_jwt(sub, vec![Role::new("admin")], false);

    let res = srv.get(&token, "/whoami").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["principal_id"].as_str().unwrap(), sub.to_string());
    assert_eq!(body["is_admin"], true);
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "admin"));
}

#[tokio::test]
async fn create_derives_expiry_and_rejects_duplicates() {
    let srv = TestServer::spawn().await;
    let admin = admin_token();
    let spcc = srv.training(&admin, "SPCC", Some(365)).await;
    let fueler = srv.fueler(&admin, PrincipalId::new(), "Dana Ortiz").await;

    let completed = today() - ChronoDuration::days(1);
    let res = srv
        .post(
            &admin,
            "/certifications",
            json!({ "fueler": fueler, "training": spcc, "completed_date": completed }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let record: serde_json::Value = res.json().await.unwrap();
    let expected = today() + ChronoDuration::days(364);
    assert_eq!(record["expiry_date"].as_str().unwrap(), expected.to_string());
    assert_eq!(record["days_until_expiry"], 364);
    assert_eq!(record["expiry_status"], "valid");

    let res = srv
        .post(
            &admin,
            "/certifications",
            json!({ "fueler": fueler, "training": spcc, "completed_date": today() }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = srv.get(&admin, &format!("/certifications?fueler={fueler}")).await;
    let items: Vec<serde_json::Value> = res.json().await.unwrap();
    assert_eq!(items.len(), 1);

    // Plain create writes no history.
    let res = srv.get(&admin, "/certifications/history").await;
    let history: Vec<serde_json::Value> = res.json().await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn completing_twice_updates_in_place_and_keeps_history() {
    let srv = TestServer::spawn().await;
    let admin = admin_token();
    let wing_walk = srv.training(&admin, "Wing Walk", Some(90)).await;
    let fueler = srv.fueler(&admin, PrincipalId::new(), "Sam Reyes").await;

    let first_date = today() - ChronoDuration::days(30);
    let res = srv
        .post(
            &admin,
            "/certifications/complete",
            json!({ "fueler_id": fueler, "training_id": wing_walk, "completed_date": first_date }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let first: serde_json::Value = res.json().await.unwrap();
    assert_eq!(first["outcome"], "created");

    let res = srv
        .post(
            &admin,
            "/certifications/complete",
            json!({ "fueler_id": fueler, "training_id": wing_walk, "notes": "Recurrent" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let second: serde_json::Value = res.json().await.unwrap();
    assert_eq!(second["outcome"], "updated");
    assert!(second["id"].is_string());
    assert_eq!(second["id"], first["id"]);
    assert_eq!(second["completed_date"].as_str().unwrap(), today().to_string());
    assert_eq!(second["notes"], "Recurrent");
    let expected = today() + ChronoDuration::days(90);
    assert_eq!(second["expiry_date"].as_str().unwrap(), expected.to_string());
    assert_eq!(second["expiry_status"], "valid");
    assert_ne!(second["history_id"], first["history_id"]);

    let res = srv.get(&admin, &format!("/fuelers/{fueler}/certifications")).await;
    let items: Vec<serde_json::Value> = res.json().await.unwrap();
    assert_eq!(items.len(), 1);

    let res = srv.get(&admin, &format!("/certifications/history?fueler={fueler}&training={wing_walk}")).await;
    let history: Vec<serde_json::Value> = res.json().await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["notes"], "Recurrent");
    assert_eq!(history[0]["id"], second["history_id"]);

    let entry_id = history[1]["id"].as_str().unwrap();
    let res = srv.get(&admin, &format!("/certifications/history/{entry_id}")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let entry: serde_json::Value = res.json().await.unwrap();
    assert_eq!(entry["completed_date"].as_str().unwrap(), first_date.to_string());
}

#[tokio::test]
async fn non_expiring_training_has_no_expiry() {
    let srv = TestServer::spawn().await;
    let admin = admin_token();
    let orientation = srv.training(&admin, "Orientation", None).await;
    let fueler = srv.fueler(&admin, PrincipalId::new(), "Lee Park").await;

    let res = srv
        .post(
            &admin,
            "/certifications/complete",
            json!({ "fueler_id": fueler, "training_id": orientation }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["outcome"], "created");
    assert!(body["expiry_date"].is_null());
    assert_eq!(body["expiry_status"], "valid");
    assert!(body["days_until_expiry"].is_null());
}

#[tokio::test]
async fn unknown_references_and_bad_input() {
    let srv = TestServer::spawn().await;
    let admin = admin_token();
    let spcc = srv.training(&admin, "SPCC", Some(365)).await;

    let res = srv
        .post(
            &admin,
            "/certifications/complete",
            json!({ "fueler_id": PrincipalId::new().to_string(), "training_id": spcc }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = srv.get(&admin, "/certifications/not-a-uuid").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");

    let res = srv.post(&admin, "/trainings", json!({ "name": "SPCC", "validity_period_days": 30 })).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = srv.post(&admin, "/trainings", json!({ "name": "Hydrant", "validity_period_days": -5 })).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv.post(&admin, "/trainings", json!({ "validity_period_days": 30 })).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn complete_refuses_a_client_supplied_expiry() {
    let srv = TestServer::spawn().await;
    let admin = admin_token();
    let spcc = srv.training(&admin, "SPCC", Some(365)).await;
    let fueler = srv.fueler(&admin, PrincipalId::new(), "Dana Ortiz").await;

    let res = srv
        .post(
            &admin,
            "/certifications/complete",
            json!({ "fueler_id": fueler, "training_id": spcc, "expiry_date": "2099-01-01" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    // Nothing was written.
    let res = srv.get(&admin, &format!("/certifications?fueler={fueler}")).await;
    let items: Vec<serde_json::Value> = res.json().await.unwrap();
    assert!(items.is_empty());
    let res = srv.get(&admin, "/certifications/history").await;
    let history: Vec<serde_json::Value> = res.json().await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn calendar_projects_completions_and_expirations() {
    let srv = TestServer::spawn().await;
    let admin = admin_token();
    let wing_walk = srv.training(&admin, "Wing Walk", Some(10)).await;
    let fueler = srv.fueler(&admin, PrincipalId::new(), "Sam Reyes").await;

    let completed = today() - ChronoDuration::days(2);
    let res = srv
        .post(
            &admin,
            "/certifications/complete",
            json!({ "fueler_id": fueler, "training_id": wing_walk, "completed_date": completed }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let start = today() - ChronoDuration::days(5);
    let end = today() + ChronoDuration::days(30);
    let res = srv.get(&admin, &format!("/certifications/calendar?start={start}&end={end}")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let events: Vec<serde_json::Value> = res.json().await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["type"], "completed");
    assert_eq!(events[0]["date"].as_str().unwrap(), completed.to_string());
    assert_eq!(events[1]["type"], "expiring");
    assert_eq!(events[1]["fueler_name"], "Sam Reyes");
    assert_eq!(events[1]["training_name"], "Wing Walk");

    let res = srv.get(&admin, &format!("/certifications/calendar?start={end}&end={start}")).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv.get(&admin, "/certifications/calendar?start=yesterday").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn fuelers_see_their_own_certifications() {
    let srv = TestServer::spawn().await;
    let admin = admin_token();
    let account = PrincipalId::new();
    let spcc = srv.training(&admin, "SPCC", Some(365)).await;
    let fueler = srv.fueler(&admin, account, "Dana Ortiz").await;

    let res = srv
        .post(&admin, "/certifications/complete", json!({ "fueler_id": fueler, "training_id": spcc }))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = srv.get(&line_token(account), "/fuelers/me/certifications").await;
    assert_eq!(res.status(), StatusCode::OK);
    let items: Vec<serde_json::Value> = res.json().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["training_id"].as_str().unwrap(), spcc);

    // No profile linked to this account.
    let res = srv.get(&line_token(PrincipalId::new()), "/fuelers/me/certifications").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn referenced_rows_cannot_be_deleted() {
    let srv = TestServer::spawn().await;
    let admin = admin_token();
    let spcc = srv.training(&admin, "SPCC", Some(365)).await;
    let fueler = srv.fueler(&admin, PrincipalId::new(), "Dana Ortiz").await;

    let res = srv
        .post(&admin, "/certifications/complete", json!({ "fueler_id": fueler, "training_id": spcc }))
        .await;
    let body: serde_json::Value = res.json().await.unwrap();
    let cert_id = body["id"].as_str().unwrap().to_string();

    let res = srv.client.delete(srv.url(&format!("/trainings/{spcc}"))).bearer_auth(&admin).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = srv
        .client
        .delete(srv.url(&format!("/certifications/{cert_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = srv.get(&admin, &format!("/certifications/{cert_id}")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // History survives the record and still pins the fueler.
    let res = srv.get(&admin, "/certifications/history").await;
    let history: Vec<serde_json::Value> = res.json().await.unwrap();
    assert_eq!(history.len(), 1);

    let res = srv.client.delete(srv.url(&format!("/fuelers/{fueler}"))).bearer_auth(&admin).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn fuelers_complete_their_assigned_training() {
    let srv = TestServer::spawn().await;
    let admin = admin_token();
    let account = PrincipalId::new();
    let wing_walk = srv.training(&admin, "Wing Walk", Some(90)).await;
    let fueler = srv.fueler(&admin, account, "Sam Reyes").await;
    let due = today() + ChronoDuration::days(14);

    // Line users cannot assign.
    let res = srv
        .post(&line_token(account), "/assignments", json!({ "fueler": fueler, "training": wing_walk }))
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv
        .post(
            &admin,
            "/assignments",
            json!({ "fueler": fueler, "training": wing_walk, "due_date": due, "notes": "Before peak season" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let assignment: serde_json::Value = res.json().await.unwrap();
    assert_eq!(assignment["status"], "assigned");
    assert_eq!(assignment["overdue"], false);
    let assignment_id = assignment["id"].as_str().unwrap().to_string();

    let res = srv
        .post(&admin, "/assignments", json!({ "fueler": fueler, "training": wing_walk }))
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let mine = line_token(account);
    let res = srv.get(&mine, "/assignments?my=true&status=assigned").await;
    assert_eq!(res.status(), StatusCode::OK);
    let items: Vec<serde_json::Value> = res.json().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"].as_str().unwrap(), assignment_id);

    // Another line user may not complete someone else's assignment.
    let res = srv
        .client
        .post(srv.url(&format!("/assignments/{assignment_id}/complete")))
        .bearer_auth(line_token(PrincipalId::new()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Empty body: completion date defaults to today, notes to the assignment's.
    let res = srv
        .client
        .post(srv.url(&format!("/assignments/{assignment_id}/complete")))
        .bearer_auth(&mine)
        .header("content-type", "application/json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let done: serde_json::Value = res.json().await.unwrap();
    assert_eq!(done["assignment"]["status"], "completed");
    assert_eq!(done["certification"]["outcome"], "created");
    assert_eq!(done["certification"]["notes"], "Before peak season");
    assert_eq!(done["assignment"]["certification_id"], done["certification"]["id"]);
    let expected = today() + ChronoDuration::days(90);
    assert_eq!(done["certification"]["expiry_date"].as_str().unwrap(), expected.to_string());

    let res = srv
        .client
        .post(srv.url(&format!("/assignments/{assignment_id}/complete")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = srv.get(&mine, "/assignments?my=true&status=assigned").await;
    let items: Vec<serde_json::Value> = res.json().await.unwrap();
    assert!(items.is_empty());
    let res = srv.get(&mine, "/assignments?my=true&status=completed").await;
    let items: Vec<serde_json::Value> = res.json().await.unwrap();
    assert_eq!(items.len(), 1);

    let res = srv.get(&admin, &format!("/certifications/history?fueler={fueler}&training={wing_walk}")).await;
    let history: Vec<serde_json::Value> = res.json().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["id"], done["certification"]["history_id"]);
}

#[tokio::test]
async fn assignment_input_is_checked() {
    let srv = TestServer::spawn().await;
    let admin = admin_token();
    let spcc = srv.training(&admin, "SPCC", Some(365)).await;
    let fueler = srv.fueler(&admin, PrincipalId::new(), "Lee Park").await;

    let yesterday = today() - ChronoDuration::days(1);
    let res = srv
        .post(&admin, "/assignments", json!({ "fueler": fueler, "training": spcc, "due_date": yesterday }))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv
        .post(
            &admin,
            "/assignments",
            json!({ "fueler": PrincipalId::new().to_string(), "training": spcc }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = srv.get(&admin, "/assignments?status=done").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // No fueler profile behind this account.
    let res = srv.get(&line_token(PrincipalId::new()), "/assignments?my=true").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = srv.post(&admin, &format!("/assignments/{}/complete", PrincipalId::new()), json!({})).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = srv.client.post(srv.url("/assignments/not-a-uuid/complete")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}
