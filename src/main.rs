mod config;
mod error;
mod models;
mod monitor;
mod notify;
mod scrapers;
mod state;
mod tracker;

use config::{Config, EXIT_MISSING_CONFIG};
use models::Item;
use scrapers::{ChromeSession, ListingCrawler, StaticPage};
use state::StateStore;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            std::process::exit(EXIT_MISSING_CONFIG);
        }
    };

    let started = Instant::now();
    info!("Watching {} for {}", config.target_url, config.cities.join(", "));
    if config.cities.is_empty() {
        warn!("TARGET_CITY contains no city names, nothing will be tracked");
    }

    let store = StateStore::new(&config.state_file);
    let prior = store.load().await;
    let notifier = notify::telegram_sink(&config.bot_token, &config.chat_id);

    let items = crawl(&config).await;
    info!("Crawl returned {} bookable items", items.len());

    let summary = monitor::process_items(&prior, &items, &config.cities, notifier.as_ref(), &store).await;
    info!(
        "Run summary: {} cities with items, {} new items, {} notifications sent, {} failed, saved: {}",
        summary.cities_with_items,
        summary.new_items,
        summary.notifications_sent,
        summary.notifications_failed,
        summary.saved
    );

    info!("Finished in {:.2} seconds.", started.elapsed().as_secs_f64());
    Ok(())
}

/// Run the browser crawl on a blocking worker; any failure means no items
async fn crawl(config: &Config) -> Vec<Item> {
    let config = config.clone();
    let job = tokio::task::spawn_blocking(move || {
        if let Some(replay) = &config.replay_html {
            info!("Replaying saved page {}", replay.display());
            // No debug dump here, it could overwrite the file being replayed
            let mut crawler = ListingCrawler::new(None);
            return match StaticPage::from_file(replay) {
                Ok(page) => crawler.crawl(page, &config.target_url),
                Err(err) => {
                    warn!("Could not read {}: {}", replay.display(), err);
                    Vec::new()
                }
            };
        }

        let mut crawler = ListingCrawler::new(Some(config.debug_html.clone()));
        match ChromeSession::launch(config.headless) {
            Ok(session) => crawler.crawl(session, &config.target_url),
            Err(err) => {
                warn!("Could not start browser: {:#}", err);
                Vec::new()
            }
        }
    });

    job.await.unwrap_or_else(|err| {
        warn!("Crawl worker failed: {}", err);
        Vec::new()
    })
}
