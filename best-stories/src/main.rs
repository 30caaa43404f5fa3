use actix_web::{web, App, HttpServer};
use anyhow::Context;
use best_stories::{http, BestStoriesService, Fetcher, Settings, StoriesCache, StorySource};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "best-stories", version, about = "Serves the current best Hacker News stories")]
struct Args {
    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overrides the settings file
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on, overrides the settings file
    #[arg(short, long)]
    port: Option<u16>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }

    info!("Starting Best Stories (remote API: {})", settings.hacker_news.base_url);
    if settings.hacker_news.accept_invalid_certs {
        info!("TLS certificate validation is disabled for the remote API");
    }

    let fetcher: Arc<dyn StorySource> =
        Arc::new(Fetcher::new(&settings.hacker_news).context("Failed to create HTTP client")?);
    let (cache, mut worker) = StoriesCache::spawn(fetcher.clone());
    let service = web::Data::new(BestStoriesService::new(
        fetcher,
        cache,
        Duration::from_secs(settings.cache.request_timeout_seconds),
    ));

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .configure(http::configure)
    })
    .bind((settings.server.host.as_str(), settings.server.port))
    .with_context(|| format!("Failed to bind {}:{}", settings.server.host, settings.server.port))?;
    if let Some(workers) = settings.server.workers {
        server = server.workers(workers);
    }
    info!("Listening on {}:{}", settings.server.host, settings.server.port);

    let server = server.run();
    let server_handle = server.handle();

    // The server stops itself on SIGINT/SIGTERM. The cache task only ends
    // early if it faulted, and nothing restarts it.
    let cache_failed = tokio::select! {
        result = server => {
            result.context("HTTP server failed")?;
            false
        }
        result = &mut worker => {
            match result {
                Err(e) => error!("Stories cache task failed: {}", e),
                Ok(()) => error!("Stories cache task stopped unexpectedly"),
            }
            true
        }
    };

    if cache_failed {
        server_handle.stop(false).await;
        anyhow::bail!("stories cache terminated, cannot serve requests");
    }

    info!("HTTP server stopped, shutting down stories cache");
    worker
        .shutdown(Duration::from_millis(settings.cache.shutdown_timeout_ms))
        .await
        .context("Failed to stop stories cache")?;

    info!("Best Stories finished");
    Ok(())
}
