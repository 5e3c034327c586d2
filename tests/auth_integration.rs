use std::net::TcpListener;
use std::sync::Arc;

use serde_json::{json, Value};

use papertrail::auth::{verify_access_token, verify_password, verify_refresh_token};
use papertrail::configuration::JwtSettings;
use papertrail::session::{InMemorySessionStore, SessionStore};
use papertrail::startup::run;
use papertrail::users::{InMemoryUserDirectory, UserDirectory};

pub struct TestApp {
    pub address: String,
    pub users: Arc<InMemoryUserDirectory>,
    pub sessions: Arc<InMemorySessionStore>,
    pub jwt: JwtSettings,
}

fn test_jwt() -> JwtSettings {
    JwtSettings {
        access_secret: "test-access-secret-at-least-32-characters".to_string(),
        refresh_secret: "test-refresh-secret-at-least-32-character".to_string(),
        access_token_expiry: 600,
        refresh_token_expiry: 864000,
        issuer: "papertrail-api".to_string(),
        clock_tolerance: 5,
    }
}

async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let users = Arc::new(InMemoryUserDirectory::new());
    let sessions = Arc::new(InMemorySessionStore::new());
    let users_dyn: Arc<dyn UserDirectory> = users.clone();
    let sessions_dyn: Arc<dyn SessionStore> = sessions.clone();
    let jwt = test_jwt();

    let server = run(listener, users_dyn, sessions_dyn, jwt.clone(), false)
        .expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        users,
        sessions,
        jwt,
    }
}

/// Client with a cookie jar, the way a browser would talk to the API
fn cookie_client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to build client")
}

/// Pull a Set-Cookie value out of a response by cookie name
fn cookie_value(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .cookies()
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}

async fn sign_up(client: &reqwest::Client, app: &TestApp, email: &str, password: &str) -> reqwest::Response {
    client
        .post(&format!("{}/api/v1/auth/sign-up", &app.address))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to execute request.")
}

// --- Sign-up Tests ---

#[tokio::test]
async fn sign_up_returns_201_and_creates_user_and_session() {
    let app = spawn_app().await;
    let client = cookie_client();

    let response = sign_up(&client, &app, "john@example.com", "SecurePass123").await;

    assert_eq!(201, response.status().as_u16());

    let access_token = cookie_value(&response, "papertrail_access")
        .expect("No access cookie in response");
    let refresh_token = cookie_value(&response, "papertrail_refresh")
        .expect("No refresh cookie in response");

    // Both tokens verify and point at a live session record
    let access = verify_access_token(&access_token, &app.jwt).expect("Invalid access token");
    let refresh = verify_refresh_token(&refresh_token, &app.jwt).expect("Invalid refresh token");
    assert_eq!(access.sid, refresh.sid);

    let session = app
        .sessions
        .get(&access.sid)
        .await
        .unwrap()
        .expect("No session record created");
    assert_eq!(session.refresh_token_jti, refresh.jti);

    // The stored password hash verifies against the plaintext only
    let user = app
        .users
        .find_by_email("john@example.com")
        .await
        .unwrap()
        .expect("User was not created");
    assert_ne!(user.password_hash, "SecurePass123");
    assert!(verify_password("SecurePass123", &user.password_hash));
    assert!(!verify_password("WrongPass123", &user.password_hash));
}

#[tokio::test]
async fn sign_up_returns_400_for_invalid_email() {
    let app = spawn_app().await;
    let client = cookie_client();

    let invalid_emails = vec![
        "notanemail",
        "user@",
        "@example.com",
        "user@@example.com",
    ];

    for invalid_email in invalid_emails {
        let response = sign_up(&client, &app, invalid_email, "SecurePass123").await;

        assert_eq!(400, response.status().as_u16(),
            "Should reject invalid email: {}", invalid_email);
    }
}

#[tokio::test]
async fn sign_up_returns_400_for_bad_password() {
    let app = spawn_app().await;
    let client = cookie_client();

    let long_password = "a".repeat(129);
    let bad_passwords = vec![
        ("short", "password too short"),
        (long_password.as_str(), "password too long"),
    ];

    for (bad_password, reason) in bad_passwords {
        let response = sign_up(&client, &app, "test@example.com", bad_password).await;

        assert_eq!(400, response.status().as_u16(),
            "Should reject password: {}", reason);
    }
}

#[tokio::test]
async fn sign_up_returns_400_for_duplicate_email_without_mutation() {
    let app = spawn_app().await;
    let client = cookie_client();

    let response1 = sign_up(&client, &app, "john@example.com", "SecurePass123").await;
    assert_eq!(201, response1.status().as_u16());

    let response2 = sign_up(&client, &app, "john@example.com", "OtherPass456").await;
    assert_eq!(400, response2.status().as_u16());

    let body: Value = response2.json().await.expect("Failed to parse response");
    assert_eq!(body["code"], "EMAIL_IN_USE");

    // Nothing was written by the rejected attempt
    assert_eq!(app.users.user_count().await, 1);
    assert_eq!(app.sessions.live_sessions().await, 1);
}

#[tokio::test]
async fn sign_up_returns_400_for_missing_fields() {
    let app = spawn_app().await;
    let client = cookie_client();

    let test_cases = vec![
        (json!({"email": "test@example.com"}), "missing password"),
        (json!({"password": "SecurePass123"}), "missing email"),
        (json!({}), "missing all fields"),
    ];

    for (body, reason) in test_cases {
        let response = client
            .post(&format!("{}/api/v1/auth/sign-up", &app.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(400, response.status().as_u16(),
            "Should reject request: {}", reason);
    }
}

// --- Sign-in Tests ---

#[tokio::test]
async fn sign_in_returns_200_for_valid_credentials() {
    let app = spawn_app().await;
    let client = cookie_client();

    sign_up(&client, &app, "john@example.com", "SecurePass123").await;

    let response = client
        .post(&format!("{}/api/v1/auth/sign-in", &app.address))
        .json(&json!({ "email": "john@example.com", "password": "SecurePass123" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    assert!(cookie_value(&response, "papertrail_access").is_some());
    assert!(cookie_value(&response, "papertrail_refresh").is_some());

    // A second session now lives alongside the sign-up session
    assert_eq!(app.sessions.live_sessions().await, 2);
}

#[tokio::test]
async fn sign_in_failures_are_indistinguishable() {
    let app = spawn_app().await;
    let client = cookie_client();

    sign_up(&client, &app, "john@example.com", "SecurePass123").await;

    let wrong_password = client
        .post(&format!("{}/api/v1/auth/sign-in", &app.address))
        .json(&json!({ "email": "john@example.com", "password": "WrongPass123" }))
        .send()
        .await
        .expect("Failed to execute request.");

    let unknown_email = client
        .post(&format!("{}/api/v1/auth/sign-in", &app.address))
        .json(&json!({ "email": "nobody@example.com", "password": "SecurePass123" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, wrong_password.status().as_u16());
    assert_eq!(400, unknown_email.status().as_u16());

    // Identical code and message: no user enumeration
    let body1: Value = wrong_password.json().await.expect("Failed to parse response");
    let body2: Value = unknown_email.json().await.expect("Failed to parse response");
    assert_eq!(body1["code"], "INVALID_CREDENTIALS");
    assert_eq!(body1["code"], body2["code"]);
    assert_eq!(body1["message"], body2["message"]);
}

// --- Protected Route Tests ---

#[tokio::test]
async fn me_returns_401_without_cookie() {
    let app = spawn_app().await;
    let client = cookie_client();

    let response = client
        .get(&format!("{}/api/v1/auth/me", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn me_returns_401_with_invalid_cookie() {
    let app = spawn_app().await;
    let client = cookie_client();

    let response = client
        .get(&format!("{}/api/v1/auth/me", &app.address))
        .header("Cookie", "papertrail_access=invalid.token.here")
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn me_returns_200_with_valid_access_cookie() {
    let app = spawn_app().await;
    let client = cookie_client();

    sign_up(&client, &app, "john@example.com", "SecurePass123").await;

    let response = client
        .get(&format!("{}/api/v1/auth/me", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["email"], "john@example.com");
    assert_eq!(body["onboardingStep"], 1);
}

// --- Sign-out Tests ---

#[tokio::test]
async fn sign_out_returns_204_and_revokes_the_session() {
    let app = spawn_app().await;
    let client = cookie_client();

    sign_up(&client, &app, "john@example.com", "SecurePass123").await;
    assert_eq!(app.sessions.live_sessions().await, 1);

    let response = client
        .post(&format!("{}/api/v1/auth/sign-out", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(204, response.status().as_u16());
    assert_eq!(app.sessions.live_sessions().await, 0);

    // The surviving access token is dead without its session
    let response = client
        .get(&format!("{}/api/v1/auth/me", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, response.status().as_u16());
}

// --- Refresh / Rotation Tests ---

#[tokio::test]
async fn refresh_returns_401_without_cookie() {
    let app = spawn_app().await;
    let client = cookie_client();

    let response = client
        .post(&format!("{}/api/v1/auth/refresh", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn refresh_rotates_the_token_pair() {
    let app = spawn_app().await;
    let client = cookie_client();

    let signup_response = sign_up(&client, &app, "john@example.com", "SecurePass123").await;
    let old_refresh = cookie_value(&signup_response, "papertrail_refresh")
        .expect("No refresh cookie in response");

    let response = client
        .post(&format!("{}/api/v1/auth/refresh", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());

    let new_refresh = cookie_value(&response, "papertrail_refresh")
        .expect("No rotated refresh cookie in response");
    assert!(cookie_value(&response, "papertrail_access").is_some());
    assert_ne!(old_refresh, new_refresh,
        "Refresh token should be rotated on each refresh");

    // Same session, new jti
    let old_claims = verify_refresh_token(&old_refresh, &app.jwt).unwrap();
    let new_claims = verify_refresh_token(&new_refresh, &app.jwt).unwrap();
    assert_eq!(old_claims.sid, new_claims.sid);
    assert_ne!(old_claims.jti, new_claims.jti);
}

#[tokio::test]
async fn reusing_a_superseded_refresh_token_destroys_the_session() {
    let app = spawn_app().await;
    let client = cookie_client();

    // Sign up and keep the original cookie pair aside
    let signup_response = sign_up(&client, &app, "a@x.com", "password1").await;
    let old_access = cookie_value(&signup_response, "papertrail_access").unwrap();
    let old_refresh = cookie_value(&signup_response, "papertrail_refresh").unwrap();
    let session_id = verify_access_token(&old_access, &app.jwt).unwrap().sid;

    // The access cookie works
    let response = client
        .get(&format!("{}/api/v1/auth/me", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    // Legitimate rotation
    let response = client
        .post(&format!("{}/api/v1/auth/refresh", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());
    let new_refresh = cookie_value(&response, "papertrail_refresh").unwrap();

    // Replaying the superseded refresh token trips reuse detection
    let raw_client = reqwest::Client::new();
    let response = raw_client
        .post(&format!("{}/api/v1/auth/refresh", &app.address))
        .header("Cookie", format!("papertrail_refresh={}", old_refresh))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, response.status().as_u16());

    // The session is gone
    assert!(app.sessions.get(&session_id).await.unwrap().is_none());

    // Even the legitimately rotated token is now dead
    let response = raw_client
        .post(&format!("{}/api/v1/auth/refresh", &app.address))
        .header("Cookie", format!("papertrail_refresh={}", new_refresh))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, response.status().as_u16());

    // And so is the technically unexpired access token
    let response = raw_client
        .get(&format!("{}/api/v1/auth/me", &app.address))
        .header("Cookie", format!("papertrail_access={}", old_access))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn me_after_user_deletion_returns_401_and_revokes_the_session() {
    let app = spawn_app().await;
    let client = cookie_client();

    let signup_response = sign_up(&client, &app, "a@x.com", "password1").await;
    let access = cookie_value(&signup_response, "papertrail_access").unwrap();
    let claims = verify_access_token(&access, &app.jwt).unwrap();

    // Drop the user row out from under the live session
    app.users.remove(claims.user_id().unwrap()).await;

    let response = client
        .get(&format!("{}/api/v1/auth/me", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
    // Self-healing: the orphaned session was deleted
    assert!(app.sessions.get(&claims.sid).await.unwrap().is_none());
}
