// src/cli/status.rs — Upstream session status (polling fallback)

use crate::infra::config::Config;
use crate::transport::http::HttpTransport;
use crate::transport::Transport;

pub async fn show_status(config: &Config, session_id: &str) -> anyhow::Result<()> {
    let transport = HttpTransport::new(&config.upstream)?;
    let status = transport.fetch_status(session_id).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
