mod prompt;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stanpost_core::{
    load_config, load_config_from_env, validate_config, validate_username, Config, Context,
    StanClient,
};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    let json = std::env::var("STANPOST_LOG_FORMAT").is_ok_and(|v| v == "json");
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let config = load()?;
    info!("Base URL: {}", config.transport.base_url);
    info!("Database path: {:?}", config.database.path);

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();

    let short = prompt::ask(
        &mut input,
        &mut output,
        "Enter username identifier (format: d01-d15, j01-j14, or z01-z15): ",
    )?;
    let Some(username) = validate_username(&short, &config.submission.unit) else {
        bail!("invalid username format: {:?}", short);
    };

    let max_batch = config.submission.max_batch;
    let client = StanClient::new(config, &username).context("Failed to initialize client")?;

    // Ctrl+C stops anything not yet dispatched.
    let ctx = Context::background();
    let cancel = ctx.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling pending submissions");
            cancel.cancel();
        }
    });

    println!("Fetching prepaid data...");
    let fetched = client
        .fetch_and_store(&ctx)
        .await
        .context("Failed to fetch data")?;
    info!(records = fetched, "Stored fetched records");

    let groups = client
        .routing_groups()
        .context("Failed to read routing groups")?;
    if groups.is_empty() {
        bail!("no routing groups available");
    }

    println!("\nAvailable routing codes:");
    for group in &groups {
        println!("KDRBM: {}, Remaining: {}", group.code, group.count);
    }

    let code = prompt::ask(&mut input, &mut output, "\nSelect KDRBM: ")?;
    let group = prompt::select_group(&groups, &code)?;

    let limit = max_batch.min(group.count);
    let answer = prompt::ask(
        &mut input,
        &mut output,
        &format!("\nEnter number of data to send (max {}): ", limit),
    )?;
    let count = prompt::parse_count(&answer, limit)?;

    let mut records = client
        .records_by_routing_code(&group.code)
        .context("Failed to load records")?;
    records.truncate(count);

    println!("\nSubmitting {} readings...", records.len());
    let outcomes = client.submit_batch(&ctx, &records).await;

    let mut submitted = 0;
    for outcome in &outcomes {
        if outcome.result.primary_succeeded() {
            submitted += 1;
        }
        println!("{}", prompt::describe(outcome));
    }
    println!("\n{} of {} readings submitted", submitted, outcomes.len());
    output.flush().ok();

    Ok(())
}

/// Config from `STANPOST_CONFIG` (default `stanpost.toml`), or defaults plus
/// environment when that file does not exist.
fn load() -> Result<Config> {
    let config_path = std::env::var("STANPOST_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("stanpost.toml"));

    let config = if config_path.exists() {
        info!("Loading configuration from {:?}", config_path);
        load_config(&config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        info!("No config file at {:?}, using defaults", config_path);
        load_config_from_env().context("Failed to load config from environment")?
    };

    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}
