//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rustls::pki_types::ServerName;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsConnector;

use edge_gateway::config::{GatewayConfig, HttpMode};
use edge_gateway::http::head::read_head;
use edge_gateway::Gateway;

/// Self-signed certificate for `localhost` written to a temp dir.
pub struct TestCert {
    pub dir: TempDir,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub cert_der: Vec<u8>,
}

pub fn self_signed() -> TestCert {
    let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let dir = TempDir::new().unwrap();
    let cert_path = dir.path().join("cert.pem");
    let key_path = dir.path().join("key.pem");
    fs::write(&cert_path, generated.cert.pem()).unwrap();
    fs::write(&key_path, generated.key_pair.serialize_pem()).unwrap();

    TestCert {
        dir,
        cert_path,
        key_path,
        cert_der: generated.cert.der().to_vec(),
    }
}

/// Write one descriptor file into `dir`.
pub fn write_descriptor(dir: &Path, file: &str, key: &str, address: &str, forward: bool) {
    let body = serde_json::json!({
        "Name": key,
        "Address": address,
        "AddForwardHeader": forward,
    });
    fs::write(dir.join(file), body.to_string()).unwrap();
}

/// Gateway settings bound to ephemeral local ports.
pub fn test_config(cert: &TestCert, apps: &Path) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.https_address = "127.0.0.1:0".into();
    config.listener.http_address = "127.0.0.1:0".into();
    config.listener.http_mode = HttpMode::Disabled;
    config.tls.cert_path = cert.cert_path.clone();
    config.tls.key_path = cert.key_path.clone();
    config.apps.dir = apps.to_path_buf();
    config.routing.domain_suffix = Some("example.com".into());
    config.timeouts.connect_secs = 2;
    config.timeouts.idle_secs = 5;
    config.timeouts.shutdown_secs = 2;
    config
}

pub async fn start_gateway(config: GatewayConfig) -> Gateway {
    Gateway::start(config).await.unwrap()
}

/// Mock backend that records request heads and counts connections.
pub struct MockBackend {
    pub addr: SocketAddr,
    pub connections: Arc<AtomicUsize>,
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<String> {
        self.requests.lock().unwrap().last().cloned()
    }
}

/// Start a backend that answers every request with `response` verbatim.
/// With `keep_open`, the socket stays open after the response.
pub async fn start_mock_backend(response: &'static str, keep_open: bool) -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));

    let conns = Arc::clone(&connections);
    let reqs = Arc::clone(&requests);
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            conns.fetch_add(1, Ordering::SeqCst);
            let reqs = Arc::clone(&reqs);
            tokio::spawn(async move {
                let mut socket = BufReader::new(socket);
                let Ok(head) = read_head(&mut socket, 64 * 1024).await else {
                    return;
                };
                reqs.lock().unwrap().push(String::from_utf8_lossy(&head).into_owned());

                let _ = socket.get_mut().write_all(response.as_bytes()).await;
                if keep_open {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                } else {
                    let _ = socket.get_mut().shutdown().await;
                }
            });
        }
    });

    MockBackend {
        addr,
        connections,
        requests,
    }
}

/// Send `request` over TLS to the gateway and read until it closes.
pub async fn tls_exchange(gateway: SocketAddr, cert: &TestCert, request: &str) -> std::io::Result<String> {
    let mut roots = rustls::RootCertStore::empty();
    roots
        .add(rustls::pki_types::CertificateDer::from(cert.cert_der.clone()))
        .unwrap();
    let config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_root_certificates(roots)
    .with_no_client_auth();

    let connector = TlsConnector::from(Arc::new(config));
    let tcp = TcpStream::connect(gateway).await?;
    let mut tls = connector
        .connect(ServerName::try_from("localhost").unwrap(), tcp)
        .await?;

    tls.write_all(request.as_bytes()).await?;
    tls.flush().await?;

    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), tls.read_to_end(&mut response))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "gateway did not close"))??;
    Ok(String::from_utf8_lossy(&response).into_owned())
}

pub fn get(host: &str) -> String {
    format!("GET / HTTP/1.1\r\nHost: {host}\r\nUser-Agent: it\r\n\r\n")
}
