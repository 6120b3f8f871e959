use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::time::Duration;

use splitfact::config::Config;
use splitfact::db::{create_pool, init_db, queries, AppState};
use splitfact::handlers;
use splitfact::models::{CreateCollective, CreateInvoice, CreateShare, CreateUser};
use splitfact::notify::Notifier;
use splitfact::payments::StripeClient;
use splitfact::payouts;

#[derive(Parser, Debug)]
#[command(name = "splitfact")]
#[command(about = "Collective invoicing settlement and payout distribution service")]
struct Cli {
    /// Seed the database with dev data (collective, members, invoice)
    #[arg(long)]
    seed: bool,
}

/// Seeds the database with dev data for manual testing: a three-member
/// collective and a 300.00 EUR invoice split evenly. Only runs in dev mode
/// and when the database is empty.
fn seed_dev_data(state: &AppState) {
    let mut conn = state.db.get().expect("Failed to get db connection for seeding");

    let existing: i64 = conn
        .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .expect("Failed to count users");
    if existing > 0 {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    tracing::info!("Seeding dev data");

    let collective = queries::create_collective(
        &conn,
        &CreateCollective {
            name: "Dev Collective".to_string(),
        },
    )
    .expect("Failed to create dev collective");

    let alice = queries::create_user(
        &conn,
        &CreateUser {
            email: "alice@dev.local".to_string(),
            name: "Alice".to_string(),
            payout_account_id: Some("acct_dev_alice".to_string()),
        },
    )
    .expect("Failed to create dev user");

    let bob = queries::create_user(
        &conn,
        &CreateUser {
            email: "bob@dev.local".to_string(),
            name: "Bob".to_string(),
            // Bob has not completed payout onboarding - distribution will
            // record a terminal failure for him.
            payout_account_id: None,
        },
    )
    .expect("Failed to create dev user");

    let carol = queries::create_user(
        &conn,
        &CreateUser {
            email: "carol@dev.local".to_string(),
            name: "Carol".to_string(),
            payout_account_id: Some("acct_dev_carol".to_string()),
        },
    )
    .expect("Failed to create dev user");

    let invoice = queries::create_invoice_with_shares(
        &mut conn,
        &CreateInvoice {
            issuer_id: alice.id.clone(),
            collective_id: Some(collective.id.clone()),
            total_cents: 30000,
            currency: "eur".to_string(),
            shares: vec![
                CreateShare {
                    user_id: alice.id.clone(),
                    amount_cents: 10000,
                },
                CreateShare {
                    user_id: bob.id.clone(),
                    amount_cents: 10000,
                },
                CreateShare {
                    user_id: carol.id.clone(),
                    amount_cents: 10000,
                },
            ],
        },
    )
    .expect("Failed to create dev invoice");

    println!();
    println!("--- DEV SEED ---");
    println!("  collective_id: {}", collective.id);
    println!("  issuer_id (Alice): {}", alice.id);
    println!("  member_id (Bob, no payout account): {}", bob.id);
    println!("  member_id (Carol): {}", carol.id);
    println!("  invoice_id: {}", invoice.id);
    println!("--- END SEED ---");
    println!();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "splitfact=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    if config.stripe_webhook_secret.is_empty() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET is not set; all webhooks will be rejected");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let http_client = reqwest::Client::new();
    let state = AppState {
        db: db_pool,
        stripe: StripeClient::new(&config.stripe_secret_key, &config.stripe_webhook_secret),
        notifier: Notifier::new(http_client, config.notify_webhook_url.clone()),
        transfer_timeout: config.transfer_timeout,
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set SPLITFACT_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    // Reconcile payouts stranded in `processing` by a crash.
    payouts::spawn_reconciliation_task(
        state.clone(),
        Duration::from_secs(5 * 60),
        config.payout_stale_after,
    );

    let app = Router::new()
        .merge(handlers::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Splitfact server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
