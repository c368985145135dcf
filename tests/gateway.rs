//! End-to-end tests: TLS client → gateway → mock backend.

use std::time::Duration;

use tempfile::TempDir;

use edge_gateway::config::HttpMode;
use edge_gateway::reload::ReloadReason;

mod common;

#[tokio::test]
async fn routes_by_host_and_forwards_client_address() {
    let cert = common::self_signed();
    let apps = TempDir::new().unwrap();
    let backend = common::start_mock_backend(
        "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
        false,
    )
    .await;
    common::write_descriptor(apps.path(), "app1.conf", "app1", &backend.addr.to_string(), true);

    let gateway = common::start_gateway(common::test_config(&cert, apps.path())).await;
    let response = common::tls_exchange(gateway.https_addr(), &cert, &common::get("app1.example.com"))
        .await
        .unwrap();

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.ends_with("\r\n\r\nhello"));

    let seen = backend.last_request().unwrap();
    assert!(seen.starts_with("GET / HTTP/1.1\r\n"));
    assert_eq!(seen.matches("X-Forwarded-For: 127.0.0.1:").count(), 1);

    gateway.shutdown().await;
}

#[tokio::test]
async fn unknown_host_is_404_without_touching_backend() {
    let cert = common::self_signed();
    let apps = TempDir::new().unwrap();
    let backend = common::start_mock_backend("HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n", false).await;
    common::write_descriptor(apps.path(), "app1.conf", "app1", &backend.addr.to_string(), true);

    let gateway = common::start_gateway(common::test_config(&cert, apps.path())).await;
    let response = common::tls_exchange(gateway.https_addr(), &cert, &common::get("other.example.com"))
        .await
        .unwrap();

    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(response.contains("Unknown app name"));
    assert_eq!(backend.connection_count(), 0);

    let response = common::tls_exchange(gateway.https_addr(), &cert, &common::get("app1.example.net"))
        .await
        .unwrap();
    assert!(response.contains("Invalid domain"));

    gateway.shutdown().await;
}

#[tokio::test]
async fn keep_alive_backend_does_not_hang_tunnel() {
    let cert = common::self_signed();
    let apps = TempDir::new().unwrap();
    let backend = common::start_mock_backend(
        "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: keep-alive\r\n\r\nhello",
        true,
    )
    .await;
    common::write_descriptor(apps.path(), "app1.conf", "app1", &backend.addr.to_string(), false);

    let gateway = common::start_gateway(common::test_config(&cert, apps.path())).await;
    let response = tokio::time::timeout(
        Duration::from_secs(3),
        common::tls_exchange(gateway.https_addr(), &cert, &common::get("app1.example.com")),
    )
    .await
    .expect("tunnel must finish at the Content-Length boundary")
    .unwrap();

    assert!(response.contains("Connection: close\r\n"));
    assert!(!response.contains("keep-alive"));
    assert!(response.ends_with("hello"));

    gateway.shutdown().await;
}

#[tokio::test]
async fn chunked_response_passes_through() {
    let cert = common::self_signed();
    let apps = TempDir::new().unwrap();
    let backend = common::start_mock_backend(
        "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n",
        true,
    )
    .await;
    common::write_descriptor(apps.path(), "app1.conf", "app1", &backend.addr.to_string(), false);

    let gateway = common::start_gateway(common::test_config(&cert, apps.path())).await;
    let response = common::tls_exchange(gateway.https_addr(), &cert, &common::get("app1.example.com"))
        .await
        .unwrap();

    assert!(response.ends_with("\r\n\r\n3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n"));
    gateway.shutdown().await;
}

#[tokio::test]
async fn reload_makes_new_backend_routable() {
    let cert = common::self_signed();
    let apps = TempDir::new().unwrap();
    let backend = common::start_mock_backend("HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok", false).await;

    let gateway = common::start_gateway(common::test_config(&cert, apps.path())).await;
    assert!(gateway.registry().current().is_empty());

    let response = common::tls_exchange(gateway.https_addr(), &cert, &common::get("app1.example.com"))
        .await
        .unwrap();
    assert!(response.starts_with("HTTP/1.1 404"));

    common::write_descriptor(apps.path(), "app1.conf", "app1", &backend.addr.to_string(), true);
    let summary = gateway.reload_handle().reload(ReloadReason::Manual).await.unwrap();
    assert_eq!(summary.backends, 1);
    assert!(summary.generation > 1);

    let response = common::tls_exchange(gateway.https_addr(), &cert, &common::get("app1.example.com"))
        .await
        .unwrap();
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.ends_with("ok"));

    gateway.shutdown().await;
}

#[tokio::test]
async fn failed_reload_keeps_active_registry() {
    let cert = common::self_signed();
    let root = TempDir::new().unwrap();
    let apps = root.path().join("apps");
    std::fs::create_dir(&apps).unwrap();
    common::write_descriptor(&apps, "app1.conf", "app1", "127.0.0.1:9001", false);

    let gateway = common::start_gateway(common::test_config(&cert, &apps)).await;
    assert_eq!(gateway.registry().current().len(), 1);

    std::fs::remove_dir_all(&apps).unwrap();
    assert!(gateway.reload_handle().reload(ReloadReason::Manual).await.is_err());
    assert_eq!(gateway.registry().current().len(), 1);

    gateway.shutdown().await;
}

#[tokio::test]
async fn unreachable_backend_closes_connection() {
    let cert = common::self_signed();
    let apps = TempDir::new().unwrap();
    let closed = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = closed.local_addr().unwrap();
    drop(closed);
    common::write_descriptor(apps.path(), "app1.conf", "app1", &dead_addr.to_string(), false);

    let gateway = common::start_gateway(common::test_config(&cert, apps.path())).await;
    let result = common::tls_exchange(gateway.https_addr(), &cert, &common::get("app1.example.com")).await;

    // hijacked already: no status line, just a closed connection
    match result {
        Ok(response) => assert!(response.is_empty(), "{response}"),
        Err(e) => assert_ne!(e.kind(), std::io::ErrorKind::TimedOut),
    }

    gateway.shutdown().await;
}

#[tokio::test]
async fn missing_descriptor_directory_is_fatal_at_startup() {
    let cert = common::self_signed();
    let root = TempDir::new().unwrap();
    let config = common::test_config(&cert, &root.path().join("does-not-exist"));

    assert!(edge_gateway::Gateway::start(config).await.is_err());
}

#[tokio::test]
async fn plain_listener_redirects_to_https() {
    let cert = common::self_signed();
    let apps = TempDir::new().unwrap();
    let mut config = common::test_config(&cert, apps.path());
    config.listener.http_mode = HttpMode::Redirect;

    let gateway = common::start_gateway(config).await;
    let http_addr = gateway.http_addr().unwrap();
    let https_port = gateway.https_addr().port();

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let response = client
        .get(format!("http://{http_addr}/docs?page=2"))
        .header("Host", "app1.example.com")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        response.headers()["location"],
        format!("https://app1.example.com:{https_port}/docs?page=2").as_str()
    );

    gateway.shutdown().await;
}

#[tokio::test]
async fn plain_listener_in_proxy_mode_tunnels() {
    let cert = common::self_signed();
    let apps = TempDir::new().unwrap();
    let backend = common::start_mock_backend("HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\nplain", false).await;
    common::write_descriptor(apps.path(), "app1.conf", "app1", &backend.addr.to_string(), false);

    let mut config = common::test_config(&cert, apps.path());
    config.listener.http_mode = HttpMode::Proxy;
    let gateway = common::start_gateway(config).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{}/", gateway.http_addr().unwrap()))
        .header("Host", "app1.example.com")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "plai");

    gateway.shutdown().await;
}

#[tokio::test]
async fn admin_api_reload_round_trip() {
    let cert = common::self_signed();
    let apps = TempDir::new().unwrap();
    let mut config = common::test_config(&cert, apps.path());
    config.admin.enabled = true;
    config.admin.bind_address = "127.0.0.1:0".into();
    config.admin.api_key = "secret".into();

    let gateway = common::start_gateway(config).await;
    let admin = gateway.admin_addr().unwrap();
    common::write_descriptor(apps.path(), "blog.conf", "blog", "127.0.0.1:9002", false);

    let client = reqwest::Client::new();
    let unauthorized = client
        .post(format!("http://{admin}/admin/reload"))
        .send()
        .await
        .unwrap();
    assert_eq!(unauthorized.status(), reqwest::StatusCode::UNAUTHORIZED);

    let summary: serde_json::Value = client
        .post(format!("http://{admin}/admin/reload"))
        .bearer_auth("secret")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["backends"], 1);
    assert!(gateway.registry().current().get("blog").is_some());

    gateway.shutdown().await;
}
