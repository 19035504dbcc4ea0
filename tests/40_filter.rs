mod common;

use anyhow::Result;
use common::{expect_status, TestApp, ADMIN, MEMBER};
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn seeded() -> Result<TestApp> {
    let app = TestApp::spawn().await?;
    let admin = app.access_token(ADMIN).await?;
    for (last, first, info) in [
        ("Smulders", "Harrie", "recurve"),
        ("Jansen", "Piet", "compound"),
        ("Berg", "Anna", "recurve left handed"),
        ("Aarts", "Piet", "barebow"),
        ("Vermeulen", "Sanne", "compound"),
    ] {
        app.create_archer(&admin, json!({ "last_name": last, "first_name": first, "info": info }))
            .await?;
    }
    Ok(app)
}

fn last_names(list: &Value) -> Vec<String> {
    list.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|a| a["last_name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn exact_and_icontains_filters() -> Result<()> {
    let app = seeded().await?;

    let list = expect_status(
        app.get("/archers/?last_name__iexact=smulders").send().await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(last_names(&list), ["Smulders"]);

    let list = expect_status(app.get("/archers/?first_name__iexact=PIET").send().await?, StatusCode::OK).await?;
    assert_eq!(last_names(&list), ["Jansen", "Aarts"]);

    let list = expect_status(app.get("/archers/?first_name=piet").send().await?, StatusCode::OK).await?;
    assert_eq!(last_names(&list), ["Jansen", "Aarts"]);

    let list = expect_status(
        app.get("/archers/?last_name__icontains=ER").send().await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(last_names(&list), ["Smulders", "Berg", "Vermeulen"]);
    Ok(())
}

#[tokio::test]
async fn search_requires_every_term() -> Result<()> {
    let app = seeded().await?;
    let list = expect_status(app.get("/archers/?search=recurve%20anna").send().await?, StatusCode::OK).await?;
    assert_eq!(last_names(&list), ["Berg"]);

    let list = expect_status(app.get("/archers/?search=compound").send().await?, StatusCode::OK).await?;
    assert_eq!(last_names(&list), ["Jansen", "Vermeulen"]);
    Ok(())
}

#[tokio::test]
async fn ordering_descending() -> Result<()> {
    let app = seeded().await?;
    let list = expect_status(app.get("/archers/?ordering=-last_name").send().await?, StatusCode::OK).await?;
    assert_eq!(last_names(&list), ["Vermeulen", "Smulders", "Jansen", "Berg", "Aarts"]);

    let list = expect_status(
        app.get("/archers/?ordering=first_name,-last_name,unknown").send().await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(last_names(&list), ["Berg", "Smulders", "Jansen", "Aarts", "Vermeulen"]);
    Ok(())
}

#[tokio::test]
async fn pagination_envelope_and_links() -> Result<()> {
    let app = seeded().await?;
    let page = expect_status(app.get("/archers/?pagenum=2&size=2").send().await?, StatusCode::OK).await?;

    assert_eq!(page["count"], 5);
    assert_eq!(last_names(&page["results"]), ["Berg", "Aarts"]);
    let next = page["next"].as_str().unwrap_or_default();
    assert!(next.ends_with("/archers/?pagenum=3&size=2"), "next was {}", next);
    let previous = page["previous"].as_str().unwrap_or_default();
    assert!(previous.ends_with("/archers/?size=2"), "previous was {}", previous);

    let last = expect_status(app.get("/archers/?pagenum=last&size=2").send().await?, StatusCode::OK).await?;
    assert_eq!(last_names(&last["results"]), ["Vermeulen"]);
    assert_eq!(last["next"], json!(null));
    Ok(())
}

#[tokio::test]
async fn page_size_is_capped_and_defaulted() -> Result<()> {
    let app = seeded().await?;
    let page = expect_status(app.get("/archers/?pagenum=1").send().await?, StatusCode::OK).await?;
    assert_eq!(page["results"].as_array().map(Vec::len), Some(2));

    let page = expect_status(app.get("/archers/?size=100").send().await?, StatusCode::OK).await?;
    assert_eq!(page["results"].as_array().map(Vec::len), Some(5));
    assert_eq!(page["previous"], json!(null));
    Ok(())
}

#[tokio::test]
async fn page_past_the_end_is_404() -> Result<()> {
    let app = seeded().await?;
    let res = app.get("/archers/?pagenum=9&size=2").send().await?;
    let body = expect_status(res, StatusCode::NOT_FOUND).await?;
    assert_eq!(body["detail"], "Invalid page.");
    Ok(())
}

#[tokio::test]
async fn club_filters() -> Result<()> {
    let app = TestApp::spawn().await?;
    let member = app.access_token(MEMBER).await?;
    for name in ["De Pijl", "Sint Sebastiaan"] {
        app.create_club(&member, json!({ "name": name })).await?;
    }

    let list = expect_status(
        app.get("/clubs/?name__iexact=de%20pijl").bearer_auth(&member).send().await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(list.as_array().map(Vec::len), Some(1));
    assert_eq!(list[0]["name"], "De Pijl");

    let list = expect_status(
        app.get("/clubs/?name__icontains=pijl").bearer_auth(&member).send().await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(list.as_array().map(Vec::len), Some(1));

    let today = chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string();
    let list = expect_status(
        app.get(&format!("/clubs/?created_at={}", today))
            .bearer_auth(&member)
            .send()
            .await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(list.as_array().map(Vec::len), Some(2));

    let list = expect_status(
        app.get("/clubs/?created_at__lt=2000-01-01T00:00:00Z")
            .bearer_auth(&member)
            .send()
            .await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(list, json!([]));

    let res = app.get("/clubs/?created_at=yesterday").bearer_auth(&member).send().await?;
    let body = expect_status(res, StatusCode::BAD_REQUEST).await?;
    assert_eq!(body["created_at"], json!(["Enter a valid date."]));
    Ok(())
}
