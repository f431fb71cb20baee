use clap::Parser;
use dotenv::dotenv;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

mod context;
use context::ServerContext;

#[derive(Parser, Debug, Clone)]
#[command(name = "bronxbot")]
#[command(author, version, about = "BronxBot - stats/telemetry pipeline server")]
pub struct Args {
    /// Postgres connection URL (DATABASE_URL in the environment wins).
    #[arg(long, default_value = "postgres://bronx@localhost:5432/bronxbot")]
    pub db_path: String,

    /// Production dashboard base URL
    #[arg(long, default_value = "https://dashboard.bronxbot.dev")]
    pub dashboard_url: String,

    /// Local dashboard base URL, used with --dev
    #[arg(long, default_value = "http://localhost:5000")]
    pub local_dashboard_url: String,

    /// Dev mode: point the relay at the local dashboard
    #[arg(long, default_value = "false")]
    pub dev: bool,

    /// UTC hour of the daily stats reset
    #[arg(long, default_value = "0")]
    pub reset_hour: u32,

    /// Seconds between stats flushes to the database
    #[arg(long, default_value = "300")]
    pub stats_interval_secs: u64,

    /// Seconds between performance samples
    #[arg(long, default_value = "300")]
    pub performance_interval_secs: u64,

    /// Seconds between comprehensive dashboard pushes
    #[arg(long, default_value = "600")]
    pub push_interval_secs: u64,

    /// Seconds between retention pruning passes
    #[arg(long, default_value = "3600")]
    pub retention_interval_secs: u64,
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("bronxbot=info".parse().expect("valid filter directive"));
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub)
        .expect("Failed to set global subscriber");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_tracing();
    let args = Args::parse();
    info!(
        "BronxBot starting. dev={}, reset_hour={} UTC",
        args.dev, args.reset_hour
    );

    let ctx = ServerContext::new(&args).await?;
    ctx.start_tasks().await?;

    if let Err(e) = ctx.dashboard.check_health().await {
        // informational only; the relay keeps retrying on its schedule
        info!("dashboard not reachable at startup: {:?}", e);
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {:?}", e);
    }
    info!("shutdown signal received");

    ctx.shutdown().await;
    info!("BronxBot stopped.");
    Ok(())
}
