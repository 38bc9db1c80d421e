//! Macroweave daemon
//!
//! Boots the trigger and playback engines against the persisted catalogues
//! and runs until interrupted. Input capture and device discovery are
//! host-specific front-ends that feed the trigger engine; this binary wires
//! everything behind them.

mod config;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::DaemonConfig;
use mw_devices::DeviceTable;
use mw_injector::{InputInjector, UnavailableInjector};
use mw_playback::{MacroCatalogue, MacroEngine};
use mw_storage::Store;
use mw_trigger::{TriggerCatalogue, TriggerEngine};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "macroweave.yaml".to_string());
    let config = DaemonConfig::load(&config_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(config = %config_path, data_dir = %config.data_dir.display(), "starting macroweave");

    let store = Store::new(&config.data_dir);

    let devices = DeviceTable::shared();
    for device in &config.devices {
        devices.register(&device.id, &device.name, Vec::new());
    }

    // No injection backend is wired on this host yet; playback degrades
    // injector calls to logged no-ops.
    let injector: Arc<dyn InputInjector> = Arc::new(UnavailableInjector);

    let playback = Arc::new(MacroEngine::new(injector));
    playback.load_records(store.load_or_default::<MacroCatalogue>().await?);
    info!(macros = playback.macro_count(), "macro catalogue ready");

    let triggers = TriggerEngine::new(devices.clone(), playback.clone());
    triggers.load_records(store.load_or_default::<TriggerCatalogue>().await?);
    info!(triggers = triggers.trigger_count(), "trigger catalogue ready");

    triggers.start();
    info!("macroweave is running");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    triggers.stop();
    playback.stop_all().await;

    store.save(&playback.to_records()).await?;
    store.save(&triggers.to_records()).await?;
    info!("catalogues saved");

    Ok(())
}
