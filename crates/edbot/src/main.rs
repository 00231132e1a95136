use std::sync::Arc;

use edbot_core::config::{resolve_path, ConfigStore};

#[tokio::main]
async fn main() -> Result<(), edbot_core::Error> {
    let path = resolve_path(std::env::args().nth(1));
    let store = Arc::new(ConfigStore::open(path)?);

    edbot_core::logging::init("edbot", &store.snapshot())?;

    edbot_discord::router::run(store)
        .await
        .map_err(|e| edbot_core::Error::External(format!("discord bot failed: {e}")))?;

    Ok(())
}
