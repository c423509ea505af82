//! End-to-end tests for the HTTP API.
//!
//! Each test seeds a fresh SQLite database, starts the server on a free port
//! with a scripted completion service, and talks to it over HTTP.

use anyhow::{bail, Result};
use async_trait::async_trait;
use feedback_pulse::config::Config;
use feedback_pulse::migrate;
use feedback_pulse::server::run_server_with_completion;
use feedback_pulse::sqlite_store::SqliteStore;
use feedback_pulse::{db, config};
use feedback_pulse_core::completion::CompletionService;
use feedback_pulse_core::models::NewFeedback;
use feedback_pulse_core::store::FeedbackStore;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

// ─── Scripted completion ────────────────────────────────────────────

/// Answers based on markers embedded in the feedback content.
///
/// - `MALFORMED` → prose with no JSON object
/// - `EXPLODE` → service error
/// - `PRAISE` → positive analysis
/// - anything else → negative analysis wrapped in prose
struct ScriptedCompletion;

#[async_trait]
impl CompletionService for ScriptedCompletion {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
        if prompt.contains("EXPLODE") {
            bail!("upstream model unavailable");
        }
        if prompt.contains("MALFORMED") {
            return Ok("I'm sorry, I cannot analyze this feedback.".to_string());
        }
        if prompt.contains("PRAISE") {
            return Ok(
                r#"{"sentiment": "positive", "sentiment_score": 90, "themes": ["documentation"], "urgency": "low"}"#
                    .to_string(),
            );
        }
        Ok(
            "Here is the analysis:\n```json\n{\"sentiment\": \"negative\", \"sentiment_score\": 20, \"themes\": [\"ux\", \"bugs\"], \"urgency\": \"high\"}\n```"
                .to_string(),
        )
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn test_config(tmp: &TempDir, port: u16) -> Config {
    let db_path = tmp.path().join("fbp.sqlite");
    let config_content = format!(
        r#"
[db]
path = "{}"

[server]
bind = "127.0.0.1:{}"

[analysis]
batch_size = 3
"#,
        db_path.display(),
        port
    );
    let cfg: Config = toml::from_str(&config_content).unwrap();
    config::validate(&cfg).unwrap();
    cfg
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

fn item(source: &str, content: &str, created_at: Option<&str>) -> NewFeedback {
    NewFeedback {
        source: source.to_string(),
        author: Some("tester".to_string()),
        content: content.to_string(),
        created_at: created_at.map(str::to_string),
    }
}

/// Seven records: five recent, two old. IDs are assigned 1..=7 in this order.
fn seed_items() -> Vec<NewFeedback> {
    vec![
        item("github", "Dashboard crashes when filtering", None),
        item("discord", "PRAISE the docs are lovely", None),
        item("github", "Upload is 100% broken on Safari", None),
        item("email", "MALFORMED please look at this", None),
        item("support", "EXPLODE billing page times out", None),
        item("forum", "Pricing page is confusing", Some("2020-01-01 00:00:00")),
        item("twitter", "Onboarding took forever", Some("2020-02-01 00:00:00")),
    ]
}

/// Seed the database and start the server; returns the base URL.
async fn start_server(tmp: &TempDir) -> String {
    let port = find_free_port();
    let cfg = test_config(tmp, port);

    migrate::run_migrations(&cfg).await.unwrap();
    let pool = db::connect(&cfg).await.unwrap();
    let store = SqliteStore::new(pool.clone());
    for it in seed_items() {
        store.insert_feedback(&it).await.unwrap();
    }
    pool.close().await;

    let server_cfg = cfg.clone();
    tokio::spawn(async move {
        run_server_with_completion(&server_cfg, Arc::new(ScriptedCompletion))
            .await
            .unwrap();
    });
    wait_for_server(port).await;

    format!("http://127.0.0.1:{}", port)
}

async fn get_json(client: &reqwest::Client, url: &str) -> (u16, Value) {
    let resp = client.get(url).send().await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn post_json(client: &reqwest::Client, url: &str, body: Value) -> (u16, Value) {
    let resp = client.post(url).json(&body).send().await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

// ─── Listing ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_listing_pages_cover_total_exactly() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;
    let client = reqwest::Client::new();

    let (status, body) = get_json(&client, &format!("{}/api/feedback?limit=3", base)).await;
    assert_eq!(status, 200);
    assert_eq!(body["meta"]["total"], 7);
    assert_eq!(body["meta"]["limit"], 3);
    assert_eq!(body["meta"]["offset"], 0);
    assert_eq!(body["meta"]["pages"], 3);
    assert_eq!(body["meta"]["currentPage"], 1);

    let mut seen = HashSet::new();
    for page in 1..=3 {
        let offset = (page - 1) * 3;
        let (_, body) = get_json(
            &client,
            &format!("{}/api/feedback?limit=3&offset={}", base, offset),
        )
        .await;
        assert_eq!(body["meta"]["currentPage"], page);
        for row in body["data"].as_array().unwrap() {
            assert!(seen.insert(row["id"].as_i64().unwrap()));
        }
    }
    assert_eq!(seen.len(), 7);
}

#[tokio::test]
async fn test_listing_newest_first() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;
    let client = reqwest::Client::new();

    let (_, body) = get_json(&client, &format!("{}/api/feedback", base)).await;
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 7);
    // The two backdated records come last, older one at the very end.
    assert_eq!(data[5]["id"], 7);
    assert_eq!(data[6]["id"], 6);
    assert!(data[0]["sentiment"].is_null());
    assert!(data[0]["analyzed_at"].is_null());
}

#[tokio::test]
async fn test_listing_filters() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;
    let client = reqwest::Client::new();

    let (_, body) = get_json(&client, &format!("{}/api/feedback?days=7", base)).await;
    assert_eq!(body["meta"]["total"], 5);

    let (_, body) = get_json(&client, &format!("{}/api/feedback?source=GitHub", base)).await;
    assert_eq!(body["meta"]["total"], 2);

    // Empty parameters are ignored.
    let (status, body) = get_json(
        &client,
        &format!("{}/api/feedback?source=&sentiment=&search=", base),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["meta"]["total"], 7);

    // `%` is matched literally, not as a wildcard.
    let (_, body) = get_json(&client, &format!("{}/api/feedback?search=%25", base)).await;
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["data"][0]["id"], 3);

    let (_, body) = get_json(&client, &format!("{}/api/feedback?search=dashboard", base)).await;
    assert_eq!(body["meta"]["total"], 1);
}

#[tokio::test]
async fn test_listing_validation() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;
    let client = reqwest::Client::new();

    for query in [
        "sentiment=happy",
        "limit=0",
        "limit=abc",
        "offset=-1",
        "days=0",
        "limit=5&limit=10",
    ] {
        let (status, body) = get_json(&client, &format!("{}/api/feedback?{}", base, query)).await;
        assert_eq!(status, 400, "query {} should be rejected", query);
        assert!(body["error"].is_string());
    }

    // A window longer than any stored history means no window at all.
    let (status, body) =
        get_json(&client, &format!("{}/api/feedback?days=999999999999", base)).await;
    assert_eq!(status, 200);
    assert_eq!(body["meta"]["total"], 7);

    let (status, body) = get_json(&client, &format!("{}/api/feedback?limit=5000", base)).await;
    assert_eq!(status, 200);
    assert_eq!(body["meta"]["limit"], 100);
    assert_eq!(body["meta"]["pages"], 1);
}

// ─── Stats ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_stats_before_analysis() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;
    let client = reqwest::Client::new();

    let (status, body) = get_json(&client, &format!("{}/api/stats", base)).await;
    assert_eq!(status, 200);
    assert_eq!(body["total"], 7);
    assert_eq!(body["recentCount"], 5);
    assert_eq!(body["bySentiment"], json!([{ "sentiment": null, "count": 7 }]));
    assert_eq!(body["byUrgency"], json!([{ "urgency": null, "count": 7 }]));
    assert_eq!(body["topThemes"], json!([]));

    let github = body["bySource"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["source"] == "github")
        .unwrap();
    assert_eq!(github["count"], 2);
}

// ─── Analysis ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_analyze_persists_and_updates_stats() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;
    let client = reqwest::Client::new();

    let (status, body) = post_json(&client, &format!("{}/api/analyze/1", base), json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Analysis complete");
    assert_eq!(body["analysis"]["sentiment"], "negative");
    assert_eq!(body["analysis"]["sentiment_score"], 20);
    assert_eq!(body["analysis"]["themes"], json!(["ux", "bugs"]));
    assert_eq!(body["analysis"]["urgency"], "high");
    assert_eq!(body["feedback"]["id"], 1);
    assert_eq!(body["feedback"]["themes"], "ux,bugs");
    assert!(body["feedback"]["analyzed_at"].is_string());

    let (_, stats) = get_json(&client, &format!("{}/api/stats", base)).await;
    assert_eq!(
        stats["topThemes"],
        json!([{ "theme": "ux", "count": 1 }, { "theme": "bugs", "count": 1 }])
    );

    // Re-analysis overwrites without error.
    let (status, _) = post_json(&client, &format!("{}/api/analyze/1", base), json!({})).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_analyze_error_statuses() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;
    let client = reqwest::Client::new();

    let (status, body) = post_json(&client, &format!("{}/api/analyze/999", base), json!({})).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "Feedback not found");

    let (status, _) = post_json(&client, &format!("{}/api/analyze/abc", base), json!({})).await;
    assert_eq!(status, 400);

    // Undecodable path segments still answer with a JSON error body.
    let (status, body) = post_json(&client, &format!("{}/api/analyze/%FF", base), json!({})).await;
    assert_eq!(status, 400);
    assert!(body["error"].is_string());

    for path in ["/api/analyze", "/api/analyze/"] {
        let (status, body) = post_json(&client, &format!("{}{}", base, path), json!({})).await;
        assert_eq!(status, 400, "{} should be rejected", path);
        assert_eq!(body["error"], "Missing feedback ID");
    }

    let (status, body) = post_json(&client, &format!("{}/api/analyze/5", base), json!({})).await;
    assert_eq!(status, 500);
    assert_eq!(body["error"], "Internal server error");
    assert!(body.get("raw").is_none());
}

#[tokio::test]
async fn test_malformed_response_leaves_record_untouched() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;
    let client = reqwest::Client::new();

    let (status, body) = post_json(&client, &format!("{}/api/analyze/4", base), json!({})).await;
    assert_eq!(status, 500);
    assert_eq!(body["error"], "Failed to parse AI analysis");
    assert_eq!(body["raw"], "I'm sorry, I cannot analyze this feedback.");

    let (_, listing) = get_json(&client, &format!("{}/api/feedback?search=MALFORMED", base)).await;
    let record = &listing["data"][0];
    assert_eq!(record["id"], 4);
    assert!(record["analyzed_at"].is_null());
    assert!(record["sentiment"].is_null());
}

// ─── Bulk ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_bulk_analyze_isolates_failures() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;
    let client = reqwest::Client::new();

    let (status, body) = post_json(
        &client,
        &format!("{}/api/bulk-analyze", base),
        json!({ "ids": [1, 2, 3, 5, 6, 7, 999] }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["total"], 7);
    assert_eq!(body["succeeded"], 5);
    assert_eq!(body["failed"], 2);

    let results = body["results"].as_array().unwrap();
    let ids: Vec<i64> = results.iter().map(|r| r["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![1, 2, 3, 5, 6, 7, 999]);
    assert_eq!(results[3]["ok"], false);
    assert!(results[3]["error"].as_str().unwrap().contains("upstream"));
    assert_eq!(results[6]["ok"], false);
    assert_eq!(results[0]["ok"], true);
    assert!(results[0].get("error").is_none());

    // Stats in the response already reflect the settled selection.
    let by_sentiment = body["stats"]["bySentiment"].as_array().unwrap();
    let count_of = |key: Value| {
        by_sentiment
            .iter()
            .find(|c| c["sentiment"] == key)
            .map(|c| c["count"].as_i64().unwrap())
            .unwrap_or(0)
    };
    assert_eq!(count_of(json!("negative")), 4);
    assert_eq!(count_of(json!("positive")), 1);
    assert_eq!(count_of(Value::Null), 2);
}

#[tokio::test]
async fn test_bulk_analyze_rejects_bad_body() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;
    let client = reqwest::Client::new();

    let (status, body) = post_json(
        &client,
        &format!("{}/api/bulk-analyze", base),
        json!({ "ids": "all" }),
    )
    .await;
    assert_eq!(status, 400);
    assert!(body["error"].is_string());
}

// ─── CORS / health ──────────────────────────────────────────────────

#[tokio::test]
async fn test_cors_preflight_and_health() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;
    let client = reqwest::Client::new();

    let resp = client
        .request(reqwest::Method::OPTIONS, format!("{}/api/feedback", base))
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "GET")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );

    let (status, body) = get_json(&client, &format!("{}/health", base)).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
}
