mod command;
mod page;
mod player;

use command::ShellCommand;
use keepsake_core::config::Config;
use keepsake_core::storage::{FileStore, KeyValueStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn init_logging() -> anyhow::Result<std::path::PathBuf> {
    let data_dir = keepsake_core::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("keepsake.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // stdout belongs to the page; logs only go to the file
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,keepsake=debug,keepsake_core=debug")
            }),
        )
        .init();

    Ok(log_path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_path = init_logging()?;
    info!("Log file: {:?}", log_path);

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.paths.storage_file));
    info!("Storage file: {:?}", config.paths.storage_file);

    // Playback events from the mpv IPC reader funnel into the loop below
    let (player_tx, mut player_rx) = mpsc::channel(16);
    page::Page::render_splash();
    let mut page = page::Page::build(&config, store, player_tx).await?;
    tokio::time::sleep(page::SPLASH_HOLD).await;
    page.render_startup();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let period = Duration::from_secs(config.carousel.autoplay_secs.max(1));
    let mut autoplay = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match ShellCommand::parse(&line) {
                    Ok(ShellCommand::Quit) => break,
                    Ok(cmd) => page.handle(cmd).await,
                    Err(usage) => println!("{}", usage),
                }
            }
            Some(event) = player_rx.recv() => page.on_player_event(event),
            _ = autoplay.tick() => page.on_autoplay_tick(),
        }
    }

    page.shutdown();
    info!("Shutting down");
    Ok(())
}
