use reqwest::Client;
use std::process::{Command, Stdio};
use std::{
    net::TcpListener,
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::time::sleep;

pub const INGEST_TOKEN: &str = "ingest-test-token";
pub const METRICS_TOKEN: &str = "metrics-test-token";

/// Get an available ephemeral port on localhost.
pub fn find_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Resolve the indexer-service binary path from env or common target dirs.
pub fn resolve_binary_path() -> String {
    if let Ok(p) = std::env::var("CARGO_BIN_EXE_indexer-service") {
        return p;
    }

    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let workspace_root = manifest.parent().unwrap_or(&manifest).to_path_buf();
    let candidates = [
        workspace_root.join("target/debug/indexer-service"),
        workspace_root.join("target/release/indexer-service"),
    ];
    candidates
        .iter()
        .find(|cand| cand.exists())
        .map(|cand| cand.to_string_lossy().to_string())
        .unwrap_or_else(|| "indexer-service".to_string())
}

/// Poll /healthz until the server responds OK or timeout.
pub async fn wait_ready(base: &str, timeout_ms: u64) -> anyhow::Result<()> {
    let client = Client::new();
    let mut waited = 0u64;
    loop {
        if waited >= timeout_ms {
            anyhow::bail!("server not ready after {}ms", timeout_ms);
        }
        if let Ok(resp) = client.get(format!("{}/healthz", base)).send().await {
            if resp.status().is_success() {
                return Ok(());
            }
        }
        sleep(Duration::from_millis(50)).await;
        waited += 50;
    }
}

/// Kills the child process on drop
pub struct ChildGuard(std::process::Child);
impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
    }
}

pub async fn setup_server() -> anyhow::Result<(String, ChildGuard)> {
    let bin = resolve_binary_path();
    assert!(Path::new(&bin).exists(), "binary not found at {}", bin);

    let port = find_free_port();
    let base_url = format!("http://127.0.0.1:{}", port);

    let child = Command::new(&bin)
        .env("INGEST_AUTH_TOKEN", INGEST_TOKEN)
        .env("METRICS_AUTH_TOKEN", METRICS_TOKEN)
        .env("DB_PATH", ":memory:")
        .env("PORT", port.to_string())
        .env("RUST_LOG", "info")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    let guard = ChildGuard(child);
    wait_ready(&base_url, 10_000).await?;

    Ok((base_url, guard))
}
