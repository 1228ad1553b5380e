use mockito::Matcher;
use recipe_keeper::config::{RemoteBackend, RemoteConfig};
use recipe_keeper::remote::{self, HttpRemoteStore};
use recipe_keeper::{CacheStore, Recipe, RemoteError, RemoteRecord, RemoteStore, SyncEngine};
use serde_json::json;
use tempfile::TempDir;

fn config(base_url: &str, api_key: Option<&str>) -> RemoteConfig {
    RemoteConfig {
        backend: RemoteBackend::Http,
        base_url: Some(base_url.to_string()),
        api_key: api_key.map(String::from),
        timeout_secs: 5,
    }
}

#[tokio::test]
async fn test_save_posts_record_with_bearer_token() {
    let mut server = mockito::Server::new_async().await;
    let recipe = Recipe::new("Tacos");
    let record = RemoteRecord::new(recipe.clone(), Some(vec![1, 2, 3]));
    let body = serde_json::to_string(&record).unwrap();

    let mock = server
        .mock("POST", "/api/records")
        .match_header("authorization", "Bearer secret")
        .match_body(Matcher::PartialJson(json!({
            "id": recipe.id.to_string(),
            "name": "Tacos",
            "image": "AQID"
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await;

    let store = HttpRemoteStore::new(&config(&format!("{}/api/", server.url()), Some("secret"))).unwrap();
    let saved = store.save(&record).await.unwrap();

    assert_eq!(saved, record);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_all() {
    let mut server = mockito::Server::new_async().await;
    let a = RemoteRecord::new(Recipe::new("A"), None);
    let b = RemoteRecord::new(Recipe::new("B"), None);

    let _m = server
        .mock("GET", "/records")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(serde_json::to_string(&vec![a.clone(), b.clone()]).unwrap())
        .create_async()
        .await;

    let store = HttpRemoteStore::new(&config(&server.url(), None)).unwrap();
    assert_eq!(store.fetch_all().await.unwrap(), vec![a, b]);
}

#[tokio::test]
async fn test_update_puts_to_record_url() {
    let mut server = mockito::Server::new_async().await;
    let record = RemoteRecord::new(Recipe::new("Soup"), None);

    let mock = server
        .mock("PUT", format!("/records/{}", record.id()).as_str())
        .with_status(200)
        .with_body(serde_json::to_string(&record).unwrap())
        .create_async()
        .await;

    let store = HttpRemoteStore::new(&config(&server.url(), None)).unwrap();
    assert_eq!(store.update(&record).await.unwrap(), record);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_status_codes_map_to_errors() {
    let mut server = mockito::Server::new_async().await;
    let missing = uuid::Uuid::new_v4();
    let limited = uuid::Uuid::new_v4();
    let broken = uuid::Uuid::new_v4();

    let _m1 = server
        .mock("DELETE", format!("/records/{}", missing).as_str())
        .with_status(404)
        .with_body("no such record")
        .create_async()
        .await;
    let _m2 = server
        .mock("DELETE", format!("/records/{}", limited).as_str())
        .with_status(429)
        .create_async()
        .await;
    let _m3 = server
        .mock("DELETE", format!("/records/{}", broken).as_str())
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let store = HttpRemoteStore::new(&config(&server.url(), None)).unwrap();

    let err = store.delete(missing).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(store.delete(limited).await, Err(RemoteError::RateLimited));
    assert_eq!(
        store.delete(broken).await,
        Err(RemoteError::Rejected {
            status: 500,
            message: "boom".to_string()
        })
    );
}

#[tokio::test]
async fn test_unreachable_server_is_unavailable() {
    // nothing listens on the discard port
    let store = HttpRemoteStore::new(&config("http://127.0.0.1:9", None)).unwrap();
    assert!(matches!(
        store.fetch_all().await,
        Err(RemoteError::Unavailable(_))
    ));
}

#[tokio::test]
async fn test_engine_syncs_over_http() {
    let mut server = mockito::Server::new_async().await;
    let recipe = Recipe::new("Chili");
    let record = RemoteRecord::new(recipe.clone(), None);

    let post = server
        .mock("POST", "/records")
        .with_status(200)
        .with_body(serde_json::to_string(&record).unwrap())
        .create_async()
        .await;
    let get = server
        .mock("GET", "/records")
        .with_status(200)
        .with_body(serde_json::to_string(&vec![record.clone()]).unwrap())
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let store = CacheStore::open(dir.path()).await.unwrap();
    let remote = remote::from_config(&config(&server.url(), None)).unwrap();
    let engine = SyncEngine::new(store, remote);

    engine.save_recipe(&recipe).await.unwrap();
    engine.sync_with_remote().await;

    post.assert_async().await;
    get.assert_async().await;
    let report = engine.status().await;
    assert_eq!(report.pushed, 1);
    assert!(report.last_error.is_none());
}
