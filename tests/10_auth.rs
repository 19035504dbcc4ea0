mod common;

use anyhow::Result;
use common::{expect_status, TestApp, ADMIN, MEMBER};
use reqwest::{header, StatusCode};
use serde_json::json;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let app = TestApp::spawn().await?;
    let body = expect_status(app.get("/health").send().await?, StatusCode::OK).await?;
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn obtain_returns_token_pair() -> Result<()> {
    let app = TestApp::spawn().await?;
    let tokens = app.tokens(ADMIN).await?;
    assert!(tokens["access"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(tokens["refresh"].as_str().is_some_and(|t| !t.is_empty()));
    Ok(())
}

#[tokio::test]
async fn bad_credentials_are_401_with_same_message() -> Result<()> {
    let app = TestApp::spawn().await?;

    let wrong_password = app
        .post("/api/token/")
        .json(&json!({ "username": ADMIN.0, "password": "not-it" }))
        .send()
        .await?;
    assert!(wrong_password.headers().contains_key(header::WWW_AUTHENTICATE));
    let wrong_password = expect_status(wrong_password, StatusCode::UNAUTHORIZED).await?;

    let unknown_user = app
        .post("/api/token/")
        .json(&json!({ "username": "nobody", "password": "not-it" }))
        .send()
        .await?;
    let unknown_user = expect_status(unknown_user, StatusCode::UNAUTHORIZED).await?;

    assert_eq!(wrong_password, unknown_user);
    Ok(())
}

#[tokio::test]
async fn obtain_requires_both_fields() -> Result<()> {
    let app = TestApp::spawn().await?;
    let res = app.post("/api/token/").json(&json!({})).send().await?;
    let body = expect_status(res, StatusCode::BAD_REQUEST).await?;
    assert_eq!(body["username"], json!(["This field is required."]));
    assert_eq!(body["password"], json!(["This field is required."]));
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_400() -> Result<()> {
    let app = TestApp::spawn().await?;
    let res = app
        .post("/api/token/")
        .header(header::CONTENT_TYPE, "application/json")
        .body("{not json")
        .send()
        .await?;
    let body = expect_status(res, StatusCode::BAD_REQUEST).await?;
    assert!(body["detail"].is_string());
    Ok(())
}

#[tokio::test]
async fn refresh_issues_new_access_token() -> Result<()> {
    let app = TestApp::spawn().await?;
    let tokens = app.tokens(MEMBER).await?;

    let res = app
        .post("/api/token/refresh/")
        .json(&json!({ "refresh": tokens["refresh"] }))
        .send()
        .await?;
    let body = expect_status(res, StatusCode::OK).await?;
    let access = body["access"].as_str().unwrap_or_default().to_string();

    let res = app.get("/clubs/").bearer_auth(&access).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn refresh_rejects_access_token() -> Result<()> {
    let app = TestApp::spawn().await?;
    let tokens = app.tokens(MEMBER).await?;
    let res = app
        .post("/api/token/refresh/")
        .json(&json!({ "refresh": tokens["access"] }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn refresh_token_is_not_a_bearer_credential() -> Result<()> {
    let app = TestApp::spawn().await?;
    let tokens = app.tokens(MEMBER).await?;
    let res = app
        .get("/clubs/")
        .bearer_auth(tokens["refresh"].as_str().unwrap_or_default())
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn verify_accepts_either_kind() -> Result<()> {
    let app = TestApp::spawn().await?;
    let tokens = app.tokens(MEMBER).await?;

    for token in [&tokens["access"], &tokens["refresh"]] {
        let res = app.post("/api/token/verify/").json(&json!({ "token": token })).send().await?;
        assert_eq!(expect_status(res, StatusCode::OK).await?, json!({}));
    }

    let res = app
        .post("/api/token/verify/")
        .json(&json!({ "token": "not.a.token" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn blacklisted_refresh_token_stops_working() -> Result<()> {
    let app = TestApp::spawn().await?;
    let tokens = app.tokens(MEMBER).await?;
    let refresh = json!({ "refresh": tokens["refresh"] });

    let res = app.post("/api/token/blacklist/").json(&refresh).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = app.post("/api/token/refresh/").json(&refresh).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app.post("/api/token/blacklist/").json(&refresh).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn expired_access_token_is_rejected() -> Result<()> {
    let app = TestApp::spawn_with(|config| config.auth.access_ttl_secs = 1).await?;
    let access = app.access_token(MEMBER).await?;
    tokio::time::sleep(std::time::Duration::from_millis(2100)).await;

    let res = app.get("/clubs/").bearer_auth(&access).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn refresh_ignores_stale_bearer_header() -> Result<()> {
    let app = TestApp::spawn_with(|config| config.auth.access_ttl_secs = 1).await?;
    let tokens = app.tokens(MEMBER).await?;
    let access = tokens["access"].as_str().unwrap_or_default().to_string();
    tokio::time::sleep(std::time::Duration::from_millis(2100)).await;

    let res = app
        .post("/api/token/refresh/")
        .bearer_auth(&access)
        .json(&json!({ "refresh": tokens["refresh"] }))
        .send()
        .await?;
    let body = expect_status(res, StatusCode::OK).await?;
    let fresh = body["access"].as_str().unwrap_or_default();
    let res = app.get("/clubs/").bearer_auth(fresh).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn credential_endpoints_skip_request_authentication() -> Result<()> {
    let app = TestApp::spawn().await?;
    let res = app
        .post("/api/token/")
        .bearer_auth("garbage")
        .json(&json!({ "username": MEMBER.0, "password": MEMBER.1 }))
        .send()
        .await?;
    expect_status(res, StatusCode::OK).await?;

    // A session cookie without the CSRF header does not gate token exchange.
    let res = app
        .post("/api/token")
        .header(header::COOKIE, "sessionid=stale; csrftoken=stale")
        .json(&json!({ "username": MEMBER.0, "password": MEMBER.1 }))
        .send()
        .await?;
    expect_status(res, StatusCode::OK).await?;

    let res = app
        .post("/api-auth/login/")
        .bearer_auth("garbage")
        .json(&json!({ "username": MEMBER.0, "password": MEMBER.1 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn invalid_bearer_token_fails_even_on_public_routes() -> Result<()> {
    let app = TestApp::spawn().await?;
    let res = app.get("/archers/").bearer_auth("garbage").send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn users_list_is_staff_only() -> Result<()> {
    let app = TestApp::spawn().await?;

    let res = app.get("/users/").send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let member = app.access_token(MEMBER).await?;
    let res = app.get("/users/").bearer_auth(&member).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let admin = app.access_token(ADMIN).await?;
    let users = expect_status(app.get("/users/").bearer_auth(&admin).send().await?, StatusCode::OK).await?;
    let users = users.as_array().cloned().unwrap_or_default();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("password_hash").is_none()));
    assert!(users.iter().any(|u| u["username"] == "robin" && u["is_staff"] == false));
    Ok(())
}

#[tokio::test]
async fn unknown_path_is_json_404() -> Result<()> {
    let app = TestApp::spawn().await?;
    let body = expect_status(app.get("/bows/").send().await?, StatusCode::NOT_FOUND).await?;
    assert_eq!(body, json!({ "detail": "Not found." }));
    Ok(())
}
