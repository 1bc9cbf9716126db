use diesel::{Connection, RunQueryDsl, sqlite::SqliteConnection};
use diesel_migrations::MigrationHarness;
use newsdesk_service::MIGRATIONS;

pub const TEST_ADMIN_PATH: &str = "ops-console";
pub const TEST_ADMIN_USERNAME: &str = "admin";
pub const TEST_ADMIN_PASSWORD: &str = "test-password";
pub const TEST_JWT_SECRET: &str = "integration-test-secret";

pub fn establish_test_connection() -> SqliteConnection {
    let mut connection =
        SqliteConnection::establish(":memory:").expect("Failed to create in-memory database");

    diesel::sql_query("PRAGMA foreign_keys = ON")
        .execute(&mut connection)
        .expect("Failed to enable foreign keys");

    connection
        .run_pending_migrations(MIGRATIONS)
        .expect("Failed to run migrations");

    connection
}

pub mod server_utils {
    use super::*;
    use axum::http::{HeaderValue, StatusCode, header};
    use axum_test::TestServer;
    use newsdesk_service::{DefaultAppState, auth::AuthContext, create_app};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    pub fn create_test_server() -> (TestServer, Arc<Mutex<SqliteConnection>>) {
        let connection = establish_test_connection();
        let db = Arc::new(Mutex::new(connection));

        let auth = AuthContext::new(
            TEST_JWT_SECRET,
            TEST_ADMIN_USERNAME.to_string(),
            TEST_ADMIN_PASSWORD.to_string(),
            false,
        );
        let state = DefaultAppState::new(db.clone(), auth);
        let app = create_app(state, TEST_ADMIN_PATH);

        let server = TestServer::new(app).unwrap();
        (server, db)
    }

    pub fn admin_url(path: &str) -> String {
        format!("/{TEST_ADMIN_PATH}{path}")
    }

    /// Logs in with the test credentials and returns the session token.
    pub async fn login(server: &TestServer) -> String {
        let response = server
            .post(&admin_url("/auth"))
            .json(&json!({
                "username": TEST_ADMIN_USERNAME,
                "password": TEST_ADMIN_PASSWORD,
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let body: Value = response.json();
        body["token"]
            .as_str()
            .expect("login response should carry a token")
            .to_string()
    }

    pub fn bearer(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {token}"))
            .expect("token should be a valid header value")
    }

    pub fn session_cookie(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("admin-token={token}"))
            .expect("token should be a valid header value")
    }

    /// Creates a story through the admin API and returns its id.
    pub async fn seed_story(server: &TestServer, token: &str, payload: &Value) -> i32 {
        let response = server
            .post(&admin_url("/api/stories"))
            .add_header(header::AUTHORIZATION, bearer(token))
            .json(payload)
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);

        let body: Value = response.json();
        body["id"].as_i64().expect("created story should have an id") as i32
    }
}

pub mod test_utils {
    use chrono::NaiveDateTime;
    use diesel::prelude::*;
    use diesel::sqlite::SqliteConnection;
    use newsdesk_service::schema::{categories, favorites, stories};

    pub fn count_stories(conn: &mut SqliteConnection) -> i64 {
        stories::table
            .count()
            .get_result(conn)
            .expect("Failed to count stories")
    }

    pub fn count_categories(conn: &mut SqliteConnection) -> i64 {
        categories::table
            .count()
            .get_result(conn)
            .expect("Failed to count categories")
    }

    pub fn count_favorites(conn: &mut SqliteConnection) -> i64 {
        favorites::table
            .count()
            .get_result(conn)
            .expect("Failed to count favorites")
    }

    pub fn story_id_by_url(conn: &mut SqliteConnection, url: &str) -> Option<i32> {
        stories::table
            .filter(stories::url.eq(url))
            .select(stories::id)
            .first(conn)
            .optional()
            .expect("Failed to query story by URL")
    }

    pub fn update_story_created_at(conn: &mut SqliteConnection, id: i32, created_at: NaiveDateTime) {
        diesel::update(stories::table.find(id))
            .set(stories::created_at.eq(created_at))
            .execute(conn)
            .expect("Failed to update story timestamp");
    }
}
