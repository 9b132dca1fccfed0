use std::env;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use yeahyak_gateway::{init_tracing, router, serve, AppConfig, GatewayState, OpenAIClient};

#[tokio::main]
async fn main() -> yeahyak_gateway::Result<()> {
    init_tracing();

    let path = env::var("YEAHYAK_CONFIG").unwrap_or_else(|_| "gateway.toml".into());
    let cfg = if Path::new(&path).exists() {
        info!(%path, "loading configuration");
        AppConfig::from_env_or_file(&path)?
    } else {
        warn!(%path, "configuration file not found, using defaults and environment");
        AppConfig::from_env()
    };

    let model = Arc::new(OpenAIClient::from_config(&cfg.model)?);
    let state = GatewayState::from_config(model, &cfg).await?;
    let app = router(state, &cfg.server);
    serve(app, &cfg.bind_address()).await
}
