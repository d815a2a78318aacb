mod common;

use common::{TestContext, PASSWORD};
use serde_json::{json, Value};

#[tokio::test]
async fn signup_rejects_duplicate_email_and_keeps_first_account() {
    let ctx = TestContext::spawn().await;

    let first = ctx.signup("a@x.com", PASSWORD).await;
    assert_eq!(first.status().as_u16(), 200);
    let body: Value = first.json().await.unwrap();
    assert_eq!(body["success"], true);

    let again = ctx.signup("A@X.com", "another-password").await;
    assert_eq!(again.status().as_u16(), 400);
    let body: Value = again.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "User already exists");

    assert_eq!(ctx.login("a@x.com", PASSWORD).await.status().as_u16(), 200);
    assert_eq!(
        ctx.login("a@x.com", "another-password").await.status().as_u16(),
        401
    );
}

#[tokio::test]
async fn signup_validates_input() {
    let ctx = TestContext::spawn().await;

    assert_eq!(ctx.signup("a@x.com", "short").await.status().as_u16(), 400);
    assert_eq!(ctx.signup("   ", PASSWORD).await.status().as_u16(), 400);

    let missing = ctx
        .client
        .post(ctx.url("/signup"))
        .json(&json!({ "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 400);

    let malformed = ctx
        .client
        .post(ctx.url("/signup"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status().as_u16(), 400);
    let body: Value = malformed.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn login_sets_http_only_session_cookie_and_hides_hash() {
    let ctx = TestContext::spawn().await;
    ctx.signup("a@x.com", PASSWORD).await;

    let response = ctx.login("a@x.com", PASSWORD).await;
    assert_eq!(response.status().as_u16(), 200);

    let cookie = response
        .cookies()
        .find(|c| c.name() == "session_id")
        .expect("session cookie");
    assert!(cookie.http_only());
    assert_eq!(cookie.value().len(), 43);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], "a@x.com");
    assert_eq!(body["user"]["firstName"], "Test");
    assert!(body["user"].get("passwordHash").is_none());
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn wrong_password_and_unknown_email_are_indistinguishable() {
    let ctx = TestContext::spawn().await;
    ctx.signup("a@x.com", PASSWORD).await;

    let wrong = ctx.login("a@x.com", "wrong").await;
    let unknown = ctx.login("nobody@x.com", PASSWORD).await;

    assert_eq!(wrong.status().as_u16(), 401);
    assert_eq!(unknown.status().as_u16(), 401);

    let wrong: Value = wrong.json().await.unwrap();
    let unknown: Value = unknown.json().await.unwrap();
    assert_eq!(wrong, unknown);
}

#[tokio::test]
async fn user_routes_require_a_session() {
    let ctx = TestContext::spawn().await;

    let response = ctx.get("/user").await;
    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "User not authenticated");

    let forged = reqwest::Client::new()
        .get(ctx.url("/user"))
        .header("cookie", "session_id=AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA")
        .send()
        .await
        .unwrap();
    assert_eq!(forged.status().as_u16(), 401);

    let update = ctx
        .client
        .put(ctx.url("/user/update"))
        .json(&json!({ "firstName": "Eve" }))
        .send()
        .await
        .unwrap();
    assert_eq!(update.status().as_u16(), 401);
}

#[tokio::test]
async fn profile_can_be_read_and_partially_updated() {
    let ctx = TestContext::spawn().await;
    ctx.signed_in("a@x.com").await;
    ctx.signup("taken@x.com", PASSWORD).await;

    let body: Value = ctx.get("/user").await.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["lastName"], "User");

    let update = ctx
        .client
        .put(ctx.url("/user/update"))
        .json(&json!({ "firstName": "Ada", "lastName": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(update.status().as_u16(), 200);

    let body: Value = ctx.get("/user").await.json().await.unwrap();
    assert_eq!(body["user"]["firstName"], "Ada");
    assert_eq!(body["user"]["lastName"], "User");
    assert_eq!(body["user"]["email"], "a@x.com");

    let steal = ctx
        .client
        .put(ctx.url("/user/update"))
        .json(&json!({ "email": "taken@x.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(steal.status().as_u16(), 400);
}

#[tokio::test]
async fn logout_invalidates_the_session() {
    let ctx = TestContext::spawn().await;
    ctx.signed_in("a@x.com").await;
    assert_eq!(ctx.get("/user").await.status().as_u16(), 200);

    let logout = ctx.client.post(ctx.url("/logout")).send().await.unwrap();
    assert_eq!(logout.status().as_u16(), 200);
    assert_eq!(ctx.get("/user").await.status().as_u16(), 401);

    let again = ctx.client.post(ctx.url("/logout")).send().await.unwrap();
    assert_eq!(again.status().as_u16(), 200);
}

#[tokio::test]
async fn sessions_are_independent_per_client() {
    let ctx = TestContext::spawn().await;
    ctx.signed_in("a@x.com").await;

    let other = TestContext::new_client();
    other
        .post(ctx.url("/signup"))
        .json(&json!({ "email": "b@x.com", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    other
        .post(ctx.url("/login"))
        .json(&json!({ "email": "b@x.com", "password": PASSWORD }))
        .send()
        .await
        .unwrap();

    let mine: Value = ctx.get("/user").await.json().await.unwrap();
    let theirs: Value = other
        .get(ctx.url("/user"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine["user"]["email"], "a@x.com");
    assert_eq!(theirs["user"]["email"], "b@x.com");
    assert_ne!(mine["user"]["id"], theirs["user"]["id"]);

    other.post(ctx.url("/logout")).send().await.unwrap();
    assert_eq!(ctx.get("/user").await.status().as_u16(), 200);
}

#[tokio::test]
async fn change_password_checks_the_old_one() {
    let ctx = TestContext::spawn().await;
    ctx.signed_in("a@x.com").await;

    let wrong = ctx
        .client
        .post(ctx.url("/user/change-password"))
        .json(&json!({ "oldPassword": "nope", "newPassword": "brand-new-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status().as_u16(), 401);

    let ok = ctx
        .client
        .post(ctx.url("/user/change-password"))
        .json(&json!({ "oldPassword": PASSWORD, "newPassword": "brand-new-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status().as_u16(), 200);

    assert_eq!(ctx.login("a@x.com", PASSWORD).await.status().as_u16(), 401);
    assert_eq!(
        ctx.login("a@x.com", "brand-new-pass").await.status().as_u16(),
        200
    );
}

#[tokio::test]
async fn health_reports_ok() {
    let ctx = TestContext::spawn().await;
    let body: Value = ctx.get("/health").await.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn sliding_sessions_reissue_the_cookie() {
    let ctx = TestContext::spawn_with(|config| config.session_sliding_expiry = true).await;
    ctx.signed_in("a@x.com").await;

    let response = ctx.get("/user").await;
    assert_eq!(response.status().as_u16(), 200);
    let cookie = response
        .headers()
        .get("set-cookie")
        .expect("refreshed session cookie")
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("session_id="), "{cookie}");
    assert!(cookie.contains("Max-Age=86400"), "{cookie}");
    assert!(cookie.contains("HttpOnly"), "{cookie}");

    assert_eq!(ctx.get("/user").await.status().as_u16(), 200);

    let fixed = TestContext::spawn().await;
    fixed.signed_in("a@x.com").await;
    let response = fixed.get("/user").await;
    assert_eq!(response.status().as_u16(), 200);
    assert!(response.headers().get("set-cookie").is_none());
}
