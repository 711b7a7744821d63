//! End-to-end tests for the service, library and metadata endpoints

mod common;

use common::*;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_ping_health_and_home() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.ping().await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
    assert!(body["uptime"].as_str().unwrap().starts_with("0d "));

    let body: Value = client.health().await.json().await.unwrap();
    assert_eq!(body["status"], "healthy");

    // Without a frontend directory the home route answers like /ping
    let body: Value = client.home().await.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .client
        .get(format!("{}/ping", server.base_url))
        .header("origin", "chrome-extension://abcdef")
        .send()
        .await
        .unwrap();
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_stats_on_empty_library() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.stats().await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["artists"], 0);
    assert_eq!(body["albums"], 0);
    assert_eq!(body["songs"], 0);
    assert_eq!(body["total_duration_formatted"], "0min");
}

#[tokio::test]
async fn test_stats_and_library_reflect_downloads() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    client.download_song(SONG_URL, ARTIST, "One").await;
    client.wait_for_completed("Alice/First Album/One.mp3").await;
    client.download_song(OTHER_SONG_URL, "Bob & Carol", "Two").await;
    client.wait_for_completed("Bob/First Album/Two (feat. Carol).mp3").await;

    let body: Value = client.stats().await.json().await.unwrap();
    assert_eq!(body["artists"], 2);
    assert_eq!(body["albums"], 2);
    assert_eq!(body["songs"], 2);

    let response = client.library().await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["artists"],
        json!([
            {"name": "Alice", "albums_count": 1, "songs_count": 1},
            {"name": "Bob", "albums_count": 1, "songs_count": 1},
        ])
    );
    assert_eq!(body["songs"][1]["title"], "Two (feat. Carol)");
    assert_eq!(body["songs"][1]["path"], "Bob/First Album/Two (feat. Carol).mp3");
}

#[tokio::test]
async fn test_extract_metadata_for_single_track() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.extract_metadata(SONG_URL).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["metadata"]["artist"], ARTIST);
    assert_eq!(body["metadata"]["album"], ALBUM);
    assert_eq!(body["metadata"]["duration"], 180);
}

#[tokio::test]
async fn test_extract_metadata_for_playlist() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.extract_metadata(PLAYLIST_URL).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["type"], "album");
    assert_eq!(body["title"], ALBUM);
    assert_eq!(body["total_songs"], 3);
    assert_eq!(body["songs"][0]["title"], "Intro");
}

#[tokio::test]
async fn test_extract_metadata_errors() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.extract_metadata("").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);

    server.ytdlp.fail_next("ERROR: Video unavailable");
    let response = client.extract_metadata(SONG_URL).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Video unavailable"));
}

#[tokio::test]
async fn test_playlist_download_queues_every_song() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let playlist: Value = client.extract_metadata(PLAYLIST_URL).await.json().await.unwrap();
    let response = client
        .download_playlist(&json!({
            "url": PLAYLIST_URL,
            "playlist_metadata": playlist,
        }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["added"], 3);
    assert_eq!(body["total"], 3);

    client.wait_for_completed("Alice/First Album/Outro.mp3").await;
    let body: Value = client.stats().await.json().await.unwrap();
    assert_eq!(body["songs"], 3);
    assert_eq!(
        server.ytdlp.calls(),
        vec![
            format!("{}&index=1", PLAYLIST_URL),
            format!("{}&index=2", PLAYLIST_URL),
            format!("{}&index=3", PLAYLIST_URL),
        ]
    );
}

#[tokio::test]
async fn test_playlist_download_requires_metadata() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .download_playlist(&json!({ "url": PLAYLIST_URL }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}
