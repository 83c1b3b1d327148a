// src/cli/serve.rs — Run the local HTTP API

use crate::api::{self, ApiState};
use crate::infra::config::Config;
use crate::session::SessionHandle;

pub async fn run_serve(config: &Config) -> anyhow::Result<()> {
    let (machine, recorder) = super::build_session(config)?;
    let state = ApiState {
        session: SessionHandle::spawn(machine),
        recorder,
        token: config.api.token.clone(),
    };
    eprintln!(
        "dualqa API on http://127.0.0.1:{} -> {}",
        config.api.port, config.upstream.base_url
    );
    api::start_server(&config.api, state).await
}
