mod common;

use anyhow::Result;
use common::{expect_status, TestApp, ADMIN, MEMBER};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn anonymous_list_is_allowed() -> Result<()> {
    let app = TestApp::spawn().await?;
    let body = expect_status(app.get("/archers/").send().await?, StatusCode::OK).await?;
    assert_eq!(body, json!([]));
    Ok(())
}

#[tokio::test]
async fn staff_creates_archer() -> Result<()> {
    let app = TestApp::spawn().await?;
    let admin = app.access_token(ADMIN).await?;

    let archer = app
        .create_archer(
            &admin,
            json!({ "last_name": "  Smulders ", "first_name": "Harrie", "union_number": 1001, "id": "ignored" }),
        )
        .await?;

    assert_eq!(archer["last_name"], "Smulders");
    assert_eq!(archer["middle_name"], json!(null));
    assert_eq!(archer["created_at"], archer["modified_at"]);
    assert!(archer["author"].is_i64());
    let id = archer["id"].as_str().unwrap_or_default();
    assert_ne!(id, "ignored");

    let fetched = expect_status(app.get(&format!("/archers/{}/", id)).send().await?, StatusCode::OK).await?;
    assert_eq!(fetched, archer);
    Ok(())
}

#[tokio::test]
async fn writes_need_staff() -> Result<()> {
    let app = TestApp::spawn().await?;
    let body = json!({ "last_name": "Jansen", "first_name": "Piet" });

    let res = app.post("/archers/").json(&body).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let member = app.access_token(MEMBER).await?;
    let res = app.post("/archers/").bearer_auth(&member).json(&body).send().await?;
    let detail = expect_status(res, StatusCode::FORBIDDEN).await?;
    assert_eq!(detail["detail"], "You do not have permission to perform this action.");
    Ok(())
}

#[tokio::test]
async fn authentication_is_checked_before_existence() -> Result<()> {
    let app = TestApp::spawn().await?;
    let missing = "/archers/00000000-0000-4000-8000-000000000000/";

    let res = app.delete(missing).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let admin = app.access_token(ADMIN).await?;
    let res = app.delete(missing).bearer_auth(&admin).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn malformed_id_is_404() -> Result<()> {
    let app = TestApp::spawn().await?;
    let res = app.get("/archers/not-a-uuid/").send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn validation_reports_every_field() -> Result<()> {
    let app = TestApp::spawn().await?;
    let admin = app.access_token(ADMIN).await?;

    let res = app
        .post("/archers/")
        .bearer_auth(&admin)
        .json(&json!({
            "first_name": "   ",
            "middle_name": "toolong",
            "union_number": -1,
            "author": 999
        }))
        .send()
        .await?;
    let body = expect_status(res, StatusCode::BAD_REQUEST).await?;

    assert_eq!(body["last_name"], json!(["This field is required."]));
    assert_eq!(body["first_name"], json!(["This field may not be blank."]));
    assert!(body["middle_name"].is_array());
    assert!(body["union_number"].is_array());
    assert!(body["author"].is_array());
    Ok(())
}

#[tokio::test]
async fn duplicate_union_number_is_field_error() -> Result<()> {
    let app = TestApp::spawn().await?;
    let admin = app.access_token(ADMIN).await?;
    app.create_archer(&admin, json!({ "last_name": "A", "first_name": "B", "union_number": 7 }))
        .await?;

    let res = app
        .post("/archers/")
        .bearer_auth(&admin)
        .json(&json!({ "last_name": "C", "first_name": "D", "union_number": 7 }))
        .send()
        .await?;
    let body = expect_status(res, StatusCode::BAD_REQUEST).await?;
    assert!(body["union_number"].is_array());
    Ok(())
}

#[tokio::test]
async fn put_replaces_and_patch_merges() -> Result<()> {
    let app = TestApp::spawn().await?;
    let admin = app.access_token(ADMIN).await?;
    let archer = app
        .create_archer(
            &admin,
            json!({ "last_name": "Berg", "first_name": "Anna", "info": "Compound", "union_number": 3 }),
        )
        .await?;
    let path = format!("/archers/{}/", archer["id"].as_str().unwrap_or_default());

    let res = app
        .patch(&path)
        .bearer_auth(&admin)
        .json(&json!({ "first_name": "Anne" }))
        .send()
        .await?;
    let patched = expect_status(res, StatusCode::OK).await?;
    assert_eq!(patched["first_name"], "Anne");
    assert_eq!(patched["info"], "Compound");
    assert_eq!(patched["created_at"], archer["created_at"]);
    assert_ne!(patched["modified_at"], archer["modified_at"]);

    let res = app
        .put(&path)
        .bearer_auth(&admin)
        .json(&json!({ "last_name": "Berg", "first_name": "Anna" }))
        .send()
        .await?;
    let replaced = expect_status(res, StatusCode::OK).await?;
    assert_eq!(replaced["info"], json!(null));
    assert_eq!(replaced["union_number"], json!(null));
    assert_eq!(replaced["author"], archer["author"]);

    let res = app.put(&path).bearer_auth(&admin).json(&json!({ "info": "x" })).send().await?;
    let body = expect_status(res, StatusCode::BAD_REQUEST).await?;
    assert_eq!(body["last_name"], json!(["This field is required."]));
    Ok(())
}

#[tokio::test]
async fn delete_then_gone() -> Result<()> {
    let app = TestApp::spawn().await?;
    let admin = app.access_token(ADMIN).await?;
    let archer = app
        .create_archer(&admin, json!({ "last_name": "Weg", "first_name": "Ga" }))
        .await?;
    let path = format!("/archers/{}", archer["id"].as_str().unwrap_or_default());

    let res = app.delete(&path).bearer_auth(&admin).send().await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert!(res.text().await?.is_empty());

    let res = app.get(&path).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn info_counts_archers() -> Result<()> {
    let app = TestApp::spawn().await?;
    let admin = app.access_token(ADMIN).await?;
    for (last, first) in [("A", "a"), ("B", "b"), ("C", "c")] {
        app.create_archer(&admin, json!({ "last_name": last, "first_name": first }))
            .await?;
    }

    let info = expect_status(app.get("/archers/info/").send().await?, StatusCode::OK).await?;
    assert_eq!(info["count"], 3);
    assert_eq!(info["archers"].as_array().map(Vec::len), Some(3));
    Ok(())
}
