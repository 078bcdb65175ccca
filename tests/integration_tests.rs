// Integration tests: HTTP and WebSocket endpoints

mod common;

use axum::http::{HeaderValue, StatusCode, header};
use axum_test::TestServer;
use common::{TestEnv, busy_snapshot, test_env, wait_until};
use hostwatch::routes;
use serde_json::json;

fn test_server(env: &TestEnv) -> TestServer {
    let app = routes::app(
        env.registry.clone(),
        env.store.clone(),
        env.auth.clone(),
        &env.config,
    );
    TestServer::try_new(app).unwrap()
}

/// Build TestServer with http_transport (required for WebSocket tests).
fn test_server_with_http(env: &TestEnv) -> TestServer {
    let app = routes::app(
        env.registry.clone(),
        env.store.clone(),
        env.auth.clone(),
        &env.config,
    );
    TestServer::builder().http_transport().try_build(app).unwrap()
}

/// Log in with the default credentials and return a ready Cookie header value.
async fn login(server: &TestServer) -> HeaderValue {
    let response = server
        .post("/api/login")
        .json(&json!({ "username": "admin", "password": "admin" }))
        .await;
    response.assert_status_ok();
    let set_cookie = response.header(header::SET_COOKIE);
    let pair = set_cookie
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();
    assert!(pair.starts_with("session="));
    HeaderValue::from_str(&pair).unwrap()
}

#[tokio::test]
async fn test_version_endpoint() {
    let env = test_env().await;
    let server = test_server(&env);
    let response = server.get("/version").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json.get("name").and_then(|v| v.as_str()), Some("hostwatch"));
    assert!(json.get("version").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn test_dashboard_page_is_served() {
    let env = test_env().await;
    let assets = env.dir.path().join("assets");
    std::fs::create_dir_all(&assets).unwrap();
    std::fs::write(assets.join("index.html"), "<h1>hosts</h1>").unwrap();
    std::fs::write(assets.join("app.js"), "console.log(1)").unwrap();
    let server = test_server(&env);

    server.get("/").await.assert_text("<h1>hosts</h1>");
    server.get("/assets/app.js").await.assert_text("console.log(1)");
}

#[tokio::test]
async fn test_login_rejects_bad_password() {
    let env = test_env().await;
    let server = test_server(&env);
    let response = server
        .post("/api/login")
        .json(&json!({ "username": "admin", "password": "wrong" }))
        .expect_failure()
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let json: serde_json::Value = response.json();
    assert_eq!(json["status"], "error");
}

#[tokio::test]
async fn test_client_ids_hidden_without_session() {
    let env = test_env().await;
    env.registry.register("web-1").await;
    let server = test_server(&env);

    let anonymous: serde_json::Value = server.get("/api/clients").await.json();
    assert_eq!(anonymous[0]["name"], "web-1");
    assert_eq!(anonymous[0]["id"], "");
    assert_eq!(anonymous[0]["connected"], false);
    assert_eq!(anonymous[0]["cpu"], 0.0);

    let cookie = login(&server).await;
    let admin: serde_json::Value = server
        .get("/api/clients")
        .add_header(header::COOKIE, cookie)
        .await
        .json();
    assert_eq!(admin[0]["id"].as_str().map(str::len), Some(10));
}

#[tokio::test]
async fn test_add_client_requires_session_and_persists() {
    let env = test_env().await;
    let server = test_server(&env);

    server
        .post("/api/clients/add")
        .json(&json!({ "name": "intruder" }))
        .expect_failure()
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    assert!(env.registry.is_empty().await);

    let cookie = login(&server).await;
    let response = server
        .post("/api/clients/add")
        .add_header(header::COOKIE, cookie.clone())
        .json(&json!({ "name": "db-1" }))
        .await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    let id = json["id"].as_str().unwrap().to_string();
    assert!(env.registry.contains(&id).await);

    let saved = env.store.load().await.unwrap();
    assert_eq!(saved[&id].name, "db-1");

    server
        .post("/api/clients/add")
        .add_header(header::COOKIE, cookie)
        .json(&json!({ "name": "   " }))
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rename_validates_and_reports_missing() {
    let env = test_env().await;
    let id = env.registry.register("before").await.id;
    let server = test_server(&env);
    let cookie = login(&server).await;

    server
        .post("/api/clients/rename")
        .add_header(header::COOKIE, cookie.clone())
        .json(&json!({ "id": "ZZ00000000", "name": "x" }))
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .post("/api/clients/rename")
        .add_header(header::COOKIE, cookie.clone())
        .json(&json!({ "id": id, "name": "" }))
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .post("/api/clients/rename")
        .add_header(header::COOKIE, cookie)
        .json(&json!({ "id": id, "name": "after" }))
        .await
        .assert_status_ok();
    assert_eq!(env.registry.get(&id).await.unwrap().name, "after");
}

#[tokio::test]
async fn test_reorder_ignores_unknown_ids() {
    let env = test_env().await;
    let a = env.registry.register("a").await.id;
    let b = env.registry.register("b").await.id;
    let server = test_server(&env);
    let cookie = login(&server).await;
    let mut orders = serde_json::Map::new();
    orders.insert(a.clone(), json!(5));
    orders.insert("ghost".into(), json!(0));

    server
        .post("/api/clients/reorder")
        .add_header(header::COOKIE, cookie.clone())
        .json(&json!({ "orders": orders }))
        .await
        .assert_status_ok();
    assert!(!env.registry.contains("ghost").await);

    let listed: serde_json::Value = server
        .get("/api/clients")
        .add_header(header::COOKIE, cookie)
        .await
        .json();
    assert_eq!(listed[0]["id"], b.as_str());
    assert_eq!(listed[1]["id"], a.as_str());
    assert_eq!(listed[1]["displayOrder"], 5);
}

#[tokio::test]
async fn test_logout_revokes_session() {
    let env = test_env().await;
    let server = test_server(&env);
    let cookie = login(&server).await;

    server
        .post("/api/logout")
        .add_header(header::COOKIE, cookie.clone())
        .await
        .assert_status_ok();
    server
        .post("/api/clients/add")
        .add_header(header::COOKIE, cookie)
        .json(&json!({ "name": "late" }))
        .expect_failure()
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password() {
    let env = test_env().await;
    let server = test_server(&env);
    let cookie = login(&server).await;

    server
        .post("/api/change-password")
        .add_header(header::COOKIE, cookie)
        .json(&json!({ "username": "ops", "oldPassword": "admin", "newPassword": "hunter2" }))
        .await
        .assert_status_ok();

    server
        .post("/api/login")
        .json(&json!({ "username": "ops", "password": "hunter2" }))
        .await
        .assert_status_ok();
}

// --- WebSocket tests (require http_transport + ws feature) ---

#[tokio::test]
async fn test_ws_rejects_unregistered_id() {
    let env = test_env().await;
    let server = test_server_with_http(&env);

    server
        .get_websocket("/ws")
        .add_query_param("id", "NO00000000")
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .get_websocket("/ws")
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ws_report_updates_registry_and_close_zeroes() {
    let env = test_env().await;
    let id = env.registry.register("agent-1").await.id;
    let server = test_server_with_http(&env);

    let mut ws = server
        .get_websocket("/ws")
        .add_query_param("id", &id)
        .await
        .into_websocket()
        .await;
    ws.send_json(&busy_snapshot()).await;

    let registry = env.registry.clone();
    let reported = wait_until(|| {
        let registry = registry.clone();
        let id = id.clone();
        async move {
            registry
                .get(&id)
                .await
                .is_some_and(|r| r.connected && r.metrics == busy_snapshot())
        }
    })
    .await;
    assert!(reported);
    assert!(env.registry.get(&id).await.unwrap().last_seen.is_some());

    ws.close().await;
    let zeroed = wait_until(|| {
        let registry = registry.clone();
        let id = id.clone();
        async move {
            registry
                .get(&id)
                .await
                .is_some_and(|r| !r.connected && r.metrics.is_zero())
        }
    })
    .await;
    assert!(zeroed);
    assert!(!env.registry.is_bound(&id).await);
}

#[tokio::test]
async fn test_ws_partial_snapshot_defaults_missing_fields() {
    let env = test_env().await;
    let id = env.registry.register("old-agent").await.id;
    let server = test_server_with_http(&env);

    let mut ws = server
        .get_websocket("/ws")
        .add_query_param("id", &id)
        .await
        .into_websocket()
        .await;
    ws.send_text(r#"{"cpu": 33.0, "memory": 20.0, "diskUsage": 10.0, "uploadSpeed": 1.5, "downloadSpeed": 2.5}"#)
        .await;

    let registry = env.registry.clone();
    let reported = wait_until(|| {
        let registry = registry.clone();
        let id = id.clone();
        async move {
            registry.get(&id).await.is_some_and(|r| {
                r.metrics.cpu == 33.0 && r.metrics.download_speed == 2.5 && r.metrics.disk_read_speed == 0.0
            })
        }
    })
    .await;
    assert!(reported);
}

#[tokio::test]
async fn test_ws_reconnect_preempts_without_disconnecting() {
    let env = test_env().await;
    let id = env.registry.register("flappy").await.id;
    let server = test_server_with_http(&env);

    let old = server
        .get_websocket("/ws")
        .add_query_param("id", &id)
        .await
        .into_websocket()
        .await;
    let registry = env.registry.clone();
    let bound_id = id.clone();
    assert!(wait_until(|| {
        let registry = registry.clone();
        let id = bound_id.clone();
        async move { registry.is_bound(&id).await }
    })
    .await);
    let mut new = server
        .get_websocket("/ws")
        .add_query_param("id", &id)
        .await
        .into_websocket()
        .await;
    drop(old);

    new.send_json(&busy_snapshot()).await;
    let reported = wait_until(|| {
        let registry = registry.clone();
        let id = id.clone();
        async move {
            registry
                .get(&id)
                .await
                .is_some_and(|r| r.metrics == busy_snapshot())
        }
    })
    .await;
    assert!(reported);

    // the replaced connection's close path has had time to run
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    let rec = env.registry.get(&id).await.unwrap();
    assert!(rec.connected);
    assert_eq!(rec.metrics, busy_snapshot());
    assert!(env.registry.is_bound(&id).await);
}

#[tokio::test]
async fn test_delete_closes_live_connection() {
    let env = test_env().await;
    let id = env.registry.register("doomed").await.id;
    let server = test_server_with_http(&env);
    let cookie = login(&server).await;

    let _ws = server
        .get_websocket("/ws")
        .add_query_param("id", &id)
        .await
        .into_websocket()
        .await;
    let registry = env.registry.clone();
    let bound_id = id.clone();
    assert!(wait_until(|| {
        let registry = registry.clone();
        let id = bound_id.clone();
        async move { registry.is_bound(&id).await }
    })
    .await);

    server
        .post("/api/clients/delete")
        .add_header(header::COOKIE, cookie)
        .json(&json!({ "id": id }))
        .await
        .assert_status_ok();

    assert!(!env.registry.contains(&id).await);
    assert!(!env.registry.is_bound(&id).await);
    assert!(env.store.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_add_client_reports_failed_save() {
    let env = test_env().await;
    // a regular file where the data directory should be makes every save fail
    let blocker = env.dir.path().join("blocker");
    std::fs::write(&blocker, "").unwrap();
    let store = std::sync::Arc::new(hostwatch::registry::store::ClientStore::new(
        blocker.join("clients.json"),
    ));
    let app = routes::app(env.registry.clone(), store, env.auth.clone(), &env.config);
    let server = TestServer::try_new(app).unwrap();
    let cookie = login(&server).await;

    let response = server
        .post("/api/clients/add")
        .add_header(header::COOKIE, cookie)
        .json(&json!({ "name": "unsaved" }))
        .expect_failure()
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = response.json();
    assert_eq!(json["status"], "error");
    assert!(json["error"].as_str().unwrap().contains("saving clients failed"));
}
