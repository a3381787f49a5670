use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ai_client::{Claude, Cohere, OpenAi, TextCompletion};
use news_client::{GNewsClient, NewsApiClient};
use opencage_client::OpenCageClient;
use threatmap_common::{CompletionProvider, Config};
use threatmap_ingest::server::{self, AppState};
use threatmap_ingest::traits::{CitySearch, Geocoder};
use threatmap_ingest::{
    ArticleProcessor, Classifier, EventBroadcaster, GlobalFeed, IngestionCycle, IngestionScheduler,
    LocalFeed, LocationResolver, PipelineDeps, RateLimitedClient, RetryPolicy, Sleeper, TokioSleeper,
};
use threatmap_store::{PgThreatStore, ThreatStore};

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("threatmap=info".parse()?);
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

fn completion_backend(config: &Config) -> Arc<dyn TextCompletion> {
    let key = config.completion_api_key.clone();
    let model = config.completion_model.clone();
    match config.completion_provider {
        CompletionProvider::Anthropic => {
            Arc::new(Claude::new(key, model).with_timeout(config.http_timeout))
        }
        CompletionProvider::OpenAi => {
            Arc::new(OpenAi::new(key, model).with_timeout(config.http_timeout))
        }
        CompletionProvider::Cohere => {
            Arc::new(Cohere::new(key, model).with_timeout(config.http_timeout))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    info!("ThreatMap ingest starting...");

    let config = Config::from_env()?;
    config.log_redacted();

    // Postgres
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let pg_store = PgThreatStore::new(pool);
    pg_store.migrate().await?;
    let store: Arc<dyn ThreatStore> = Arc::new(pg_store);

    let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);
    let base_policy = RetryPolicy::new(config.backoff_initial, config.backoff_max);
    // Each feed may spend at most one of its own intervals backing off.
    let global_client = RateLimitedClient::new(
        base_policy.clone().with_budget(Some(config.global_interval)),
        sleeper.clone(),
    );
    let local_client = RateLimitedClient::new(
        base_policy.clone().with_budget(Some(config.local_interval)),
        sleeper.clone(),
    );
    let enrichment_client = RateLimitedClient::new(
        base_policy.with_budget(Some(config.local_interval.min(config.global_interval))),
        sleeper.clone(),
    );

    let geocoder: Option<Arc<dyn Geocoder>> = match &config.opencage_api_key {
        Some(key) => Some(Arc::new(OpenCageClient::new(key.clone(), Some(config.http_timeout))?)),
        None => {
            warn!("OPENCAGE_API_KEY not set, resolving locations from the fallback table only");
            None
        }
    };

    let broadcaster = Arc::new(EventBroadcaster::new());
    let deps = PipelineDeps::builder()
        .store(store)
        .classifier(Arc::new(Classifier::new(
            completion_backend(&config),
            enrichment_client.clone(),
        )))
        .resolver(Arc::new(LocationResolver::new(geocoder, enrichment_client)))
        .broadcaster(broadcaster.clone())
        .build();
    let processor = ArticleProcessor::new(deps);

    let mut scheduler = IngestionScheduler::new();

    let newsapi = match &config.news_api_key {
        Some(key) => Some(Arc::new(NewsApiClient::new(key.clone(), Some(config.http_timeout))?)),
        None => None,
    };

    match &newsapi {
        Some(client) => {
            let feed = GlobalFeed::new(client.clone(), global_client);
            scheduler = scheduler.add(
                Arc::new(IngestionCycle::new(Arc::new(feed), processor.clone())),
                config.global_interval,
                config.global_start_delay,
            );
        }
        None => warn!("NEWS_API_KEY not set, global feed disabled"),
    }

    let city_search: Option<Arc<dyn CitySearch>> = match (&config.gnews_api_key, &newsapi) {
        (Some(key), _) => Some(Arc::new(GNewsClient::new(key.clone(), Some(config.http_timeout))?)),
        (None, Some(client)) => {
            info!("GNEWS_API_KEY not set, local feed uses NewsAPI search");
            Some(client.clone())
        }
        (None, None) => {
            warn!("No news API key set, local feed disabled");
            None
        }
    };

    if let Some(search) = city_search {
        let feed = LocalFeed::new(search, local_client, sleeper, config.local_targets.clone());
        scheduler = scheduler.add(
            Arc::new(IngestionCycle::new(Arc::new(feed), processor)),
            config.local_interval,
            config.local_start_delay,
        );
    }

    let feeds = scheduler.job_names();
    let handle = scheduler.start();

    // Live server
    let app = server::router(AppState { broadcaster, feeds }, &config.frontend_url);
    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("Live server listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    handle.shutdown();
    Ok(())
}
