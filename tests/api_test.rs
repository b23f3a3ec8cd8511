//! Integration tests for the qrclaimd REST API.
//! Spins up a real server on a free port and drives it with reqwest.

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};

use qrclaimd::{bootstrap, config::DaemonConfig, rest, AppContext};

/// Start a daemon on a random port with a temp data dir; return the base URL.
async fn start_test_server() -> (String, Arc<AppContext>) {
    let data_dir = tempfile::tempdir().unwrap().keep();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let config = Arc::new(DaemonConfig::new(
        Some(port),
        Some(data_dir),
        Some("warn".to_string()),
        None,
    ));
    let ctx = bootstrap(config).await.unwrap();

    let router = rest::build_router(ctx.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    (format!("http://127.0.0.1:{port}"), ctx)
}

async fn register(client: &reqwest::Client, base: &str, email: &str) -> (String, String) {
    let resp = client
        .post(format!("{base}/api/v1/users"))
        .json(&json!({ "email": email, "password": "password1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let v: Value = resp.json().await.unwrap();
    (
        v["user"]["id"].as_str().unwrap().to_string(),
        v["token"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn end_to_end_issue_then_resolve() {
    let (base, _ctx) = start_test_server().await;
    let client = reqwest::Client::new();
    let (user_id, token) = register(&client, &base, "issuer@example.com").await;

    // Issue: one call creates the claim, renders the QR, uploads the image.
    let resp = client
        .post(format!("{base}/api/v1/claims"))
        .bearer_auth(&token)
        .json(&json!({ "account_number": "0712345678" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let v: Value = resp.json().await.unwrap();
    let claim_id = v["claim"]["id"].as_str().unwrap().to_string();
    let image_url = v["claim"]["image_url"].as_str().unwrap().to_string();
    assert_eq!(
        image_url,
        format!("{base}/objects/{user_id}/{claim_id}.png")
    );

    // The deterministic URL serves real PNG bytes.
    let img = client.get(&image_url).send().await.unwrap();
    assert_eq!(img.status(), StatusCode::OK);
    assert_eq!(img.headers()["content-type"], "image/png");
    let bytes = img.bytes().await.unwrap();
    assert_eq!(&bytes[..4], &[0x89, b'P', b'N', b'G']);

    // Direct one-shot resolution, no auth, no session.
    let resp = client
        .get(format!("{base}/api/v1/resolve/{claim_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v: Value = resp.json().await.unwrap();
    assert_eq!(v["claim"]["account_number"], "0712345678");
    let resp = client
        .get(format!("{base}/api/v1/resolve/garbage"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Anyone can resolve — open a scan session without auth.
    let resp = client
        .post(format!("{base}/api/v1/scan/sessions"))
        .send()
        .await
        .unwrap();
    let sid = resp.json::<Value>().await.unwrap()["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    let resp: Value = client
        .post(format!("{base}/api/v1/scan/sessions/{sid}/scan"))
        .json(&json!({ "payload": claim_id }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["found"], true);
    assert_eq!(resp["claim"]["account_number"], "0712345678");

    // Same code still in frame: latched, no second lookup.
    let resp: Value = client
        .post(format!("{base}/api/v1/scan/sessions/{sid}/scan"))
        .json(&json!({ "payload": claim_id }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["latched"], true);
    assert_eq!(resp["state"], "resolved");

    // Dismiss re-arms; a bogus payload is a normal not-found result.
    client
        .post(format!("{base}/api/v1/scan/sessions/{sid}/dismiss"))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap();
    let resp: Value = client
        .post(format!("{base}/api/v1/scan/sessions/{sid}/scan"))
        .json(&json!({ "payload": "bogus" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["found"], false);
    assert_eq!(resp["state"], "scanning");

    // Not-found re-armed automatically: the next event is processed.
    let resp: Value = client
        .post(format!("{base}/api/v1/scan/sessions/{sid}/scan"))
        .json(&json!({ "payload": claim_id }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["found"], true);
}

#[tokio::test]
async fn incomplete_claims_stay_out_of_the_gallery() {
    let (base, ctx) = start_test_server().await;
    let client = reqwest::Client::new();
    let (user_id, token) = register(&client, &base, "gallery@example.com").await;

    // A claim whose image never landed — issuance-in-progress.
    let pending = ctx.storage.create_claim("111", &user_id).await.unwrap();

    let mine: Value = client
        .get(format!("{base}/api/v1/claims/mine"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine["claims"].as_array().unwrap().len(), 0);

    // Retry endpoint completes it; now it appears exactly once.
    let resp = client
        .post(format!("{base}/api/v1/claims/{}/image", pending.id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let mine: Value = client
        .get(format!("{base}/api/v1/claims/mine"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let claims = mine["claims"].as_array().unwrap();
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0]["id"], pending.id.as_str());

    // A second retry on the now-complete claim is refused.
    let resp = client
        .post(format!("{base}/api/v1/claims/{}/image", pending.id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn gallery_lists_newest_first() {
    let (base, _ctx) = start_test_server().await;
    let client = reqwest::Client::new();
    let (_user_id, token) = register(&client, &base, "order@example.com").await;

    let mut ids = Vec::new();
    for account in ["one", "two", "three"] {
        let v: Value = client
            .post(format!("{base}/api/v1/claims"))
            .bearer_auth(&token)
            .json(&json!({ "account_number": account }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        ids.push(v["claim"]["id"].as_str().unwrap().to_string());
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let mine: Value = client
        .get(format!("{base}/api/v1/claims/mine"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let listed: Vec<&str> = mine["claims"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    ids.reverse();
    assert_eq!(listed, ids);
}

#[tokio::test]
async fn issuance_requires_a_session_and_a_non_empty_account() {
    let (base, _ctx) = start_test_server().await;
    let client = reqwest::Client::new();

    // No session at all.
    let resp = client
        .post(format!("{base}/api/v1/claims"))
        .json(&json!({ "account_number": "123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Valid session, empty account number — caught before any write.
    let (_uid, token) = register(&client, &base, "val@example.com").await;
    let resp = client
        .post(format!("{base}/api/v1/claims"))
        .bearer_auth(&token)
        .json(&json!({ "account_number": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_logout_lifecycle() {
    let (base, _ctx) = start_test_server().await;
    let client = reqwest::Client::new();
    let (user_id, token) = register(&client, &base, "auth@example.com").await;

    let me: Value = client
        .get(format!("{base}/api/v1/users/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["id"], user_id.as_str());
    assert_eq!(me["email"], "auth@example.com");

    // Wrong password is 401, not 500.
    let resp = client
        .post(format!("{base}/api/v1/sessions"))
        .json(&json!({ "email": "auth@example.com", "password": "wrong-one" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Logout revokes the token.
    client
        .delete(format!("{base}/api/v1/sessions"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap();
    let resp = client
        .get(format!("{base}/api/v1/users/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_reports_ok() {
    let (base, _ctx) = start_test_server().await;
    let v: Value = reqwest::get(format!("{base}/api/v1/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(v["status"], "ok");
}
