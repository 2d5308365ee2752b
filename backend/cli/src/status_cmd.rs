//! `homh status`: ask a running gateway whether it is up.

use anyhow::Result;

use homh_config::{defaults::DEFAULT_BIND, env::HOMH_BIND};

pub async fn run(bind: Option<String>) -> Result<()> {
    let bind = bind
        .or_else(|| std::env::var(HOMH_BIND).ok())
        .unwrap_or_else(|| DEFAULT_BIND.to_string());
    let url = health_url(&bind);

    println!("HOMH status: checking {url} ...");
    let client = reqwest::Client::new();
    match client.get(&url).send().await {
        Ok(resp) => {
            let status = resp.status();
            let body: serde_json::Value = resp.json().await?;
            println!("{status}\n{}", serde_json::to_string_pretty(&body)?);
        }
        Err(_) => {
            println!("HOMH gateway is not running at {bind}");
        }
    }
    Ok(())
}

/// A wildcard bind address is not dialable; query loopback instead.
fn health_url(bind: &str) -> String {
    let host_port = bind
        .strip_prefix("0.0.0.0:")
        .map(|port| format!("127.0.0.1:{port}"))
        .unwrap_or_else(|| bind.to_string());
    format!("http://{host_port}/")
}
