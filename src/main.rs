use coin_sheet::scheduler::Poller;
use coin_sheet::storage_utils::{AppConfig, AsyncStorageManager};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // config.json lives in storage/ next to the binary; defaults are written on first run.
    let storage = AsyncStorageManager::new_relative("storage").await?;
    let config: AppConfig = storage.load_or_init("config").await?;
    tracing::info!(
        url = %config.api.url,
        workbook = %config.workbook.path.display(),
        sheet = %config.workbook.sheet_name,
        interval_secs = config.poll_interval_secs,
        "starting poller"
    );

    let poller = Poller::new(config)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping after the current cycle");
            on_signal.cancel();
        }
    });

    poller.run(cancel).await;
    Ok(())
}
