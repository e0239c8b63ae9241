use anyhow::Context;
use clap::{Parser, Subcommand};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use couponledger::config::Config;
use couponledger::db::{AppState, DbPool, create_pool, init_audit_db, init_db, queries};
use couponledger::{accounts, ledger};

const POOL_SIZE: u32 = 16;

#[derive(Parser)]
#[command(name = "couponledger", version, about = "Coupon marketplace credit ledger")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create an admin account and print its API key
    CreateAdmin {
        #[arg(long)]
        name: String,
    },
    /// Check every balance against the credit log
    Reconcile,
}

fn open_databases(config: &Config) -> anyhow::Result<(DbPool, DbPool)> {
    let db = create_pool(&config.database_path, POOL_SIZE)?;
    init_db(&*db.get()?).context("Failed to initialize database")?;

    let audit = create_pool(&config.audit_database_path, POOL_SIZE)?;
    init_audit_db(&*audit.get()?).context("Failed to initialize audit database")?;

    Ok((db, audit))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "couponledger=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let (db, audit) = open_databases(&config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, db, audit).await,
        Command::CreateAdmin { name } => {
            let created = accounts::create_admin(&mut *db.get()?, &config.economy, &name)?;
            println!("Admin account: {}", created.account.id);
            println!("API key (shown once): {}", created.api_key);
            Ok(())
        }
        Command::Reconcile => {
            let mismatches = ledger::reconcile_all(&*db.get()?)?;
            if mismatches.is_empty() {
                println!("All balances match the credit log");
                return Ok(());
            }
            for report in &mismatches {
                println!(
                    "{}: balance {} vs log {} ({} entries)",
                    report.account_id, report.balance, report.log_total, report.entry_count
                );
            }
            anyhow::bail!("{} account(s) out of balance", mismatches.len())
        }
    }
}

async fn serve(config: Config, db: DbPool, audit: DbPool) -> anyhow::Result<()> {
    if config.audit_log_retention_days > 0 {
        let purged = queries::purge_old_audit_logs(&*audit.get()?, config.audit_log_retention_days)?;
        if purged > 0 {
            tracing::info!(
                "Purged {} audit events older than {} days",
                purged,
                config.audit_log_retention_days
            );
        }
    }

    if let Some(name) = &config.bootstrap_admin_name {
        let mut conn = db.get()?;
        if let Some(created) = accounts::bootstrap_admin(&mut conn, &config.economy, name)? {
            tracing::info!("Bootstrapped admin account {}", created.account.id);
            println!("Bootstrap admin API key (shown once): {}", created.api_key);
        }
    }

    if !config.audit_log_enabled {
        tracing::warn!("Audit logging is disabled");
    }

    let state = AppState::new(&config, db, audit);
    let mut app = couponledger::app(state).layer(TraceLayer::new_for_http());
    if config.dev_mode {
        tracing::warn!("Running in dev mode: CORS is permissive");
        app = app.layer(CorsLayer::permissive());
    }

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
