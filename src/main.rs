//! Vigil - dead man's switch for secrets

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vigil::{auth::ChallengeStore, config::Args, App};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("vigil={},info", args.log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Vigil - dead man's switch");
    info!("======================================");
    info!("Tick interval: {}s", args.tick_interval_secs);
    info!("Sweep interval: {}s", args.sweep_interval_secs);
    info!(
        "Default cadence: ping every {}h, release after {}h",
        args.default_ping_frequency_hours, args.default_ping_deadline_hours
    );
    info!(
        "Access codes: {}h TTL, {} attempts",
        args.access_code_ttl_hours, args.access_code_max_attempts
    );
    info!(
        "Time gate: genesis {}, {}s rounds",
        args.round_genesis, args.round_period_secs
    );
    info!("Public base URL: {}", args.public_base_url);
    info!(
        "Webhook: {}",
        if args.webhook_url.is_some() { "enabled" } else { "disabled" }
    );
    info!("======================================");

    let app = App::from_args(args)?;

    app.scheduler.clone().start().await?;

    let challenges = app.challenges.clone();
    let cleanup_every = app.args.challenge_config().ttl;
    let cleanup = tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_every);
        loop {
            interval.tick().await;
            let removed = challenges.cleanup();
            if removed > 0 {
                debug!("Removed {} expired challenges", removed);
            }
        }
    });

    info!("Vigil running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    app.scheduler.stop().await;
    cleanup.abort();

    Ok(())
}
