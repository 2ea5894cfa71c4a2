use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use teamkeys::api::{self, AppState};
use teamkeys::config::{self, Config};
use teamkeys::models::{ApiKey, ApiKeyView, KeyStatus};
use teamkeys::store::{ApiKeyStore, MemoryStore, PgStore};
use teamkeys::{ApiKeyService, NewKeyRequest};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Export spans over OTLP only when an endpoint is configured.
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "teamkeys"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "teamkeys=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    let args = cli::Cli::parse();
    let cfg = config::load()?;

    let result = match args.command {
        Some(cli::Commands::Serve { port, memory }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port, memory).await
        }
        Some(cli::Commands::Key { command }) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            let service = build_service(&cfg, Arc::new(db));
            handle_key_command(command, &service).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port, false).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

fn build_service(cfg: &Config, store: Arc<dyn ApiKeyStore>) -> ApiKeyService {
    ApiKeyService::new(store, cfg.signing_secret())
        .with_token_options(cfg.token.clone())
        .with_touch_policy(cfg.touch_policy)
}

async fn run_server(cfg: Config, port: u16, memory: bool) -> anyhow::Result<()> {
    let store: Arc<dyn ApiKeyStore> = if memory {
        if cfg.production {
            anyhow::bail!("--memory is not allowed in production");
        }
        tracing::warn!("Using in-memory key store; keys are lost on restart");
        Arc::new(MemoryStore::new())
    } else {
        tracing::info!("Connecting to database...");
        let db = PgStore::connect(&cfg.database_url).await?;
        tracing::info!("Running migrations...");
        db.migrate().await?;
        Arc::new(db)
    };

    let state = Arc::new(AppState {
        keys: build_service(&cfg, store),
        admin_key: cfg.admin_key.clone(),
    });
    if state.admin_key.is_none() {
        tracing::warn!("TEAMKEYS_ADMIN_KEY is not set; management routes will refuse requests");
    }

    let app = api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("teamkeys listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("shutting down");
}

async fn handle_key_command(cmd: cli::KeyCommands, service: &ApiKeyService) -> anyhow::Result<()> {
    match cmd {
        cli::KeyCommands::Create {
            team,
            name,
            key_type,
            created_by,
            expires_in_days,
        } => {
            let expires_at = expires_in_days.map(|d| service.now() + chrono::Duration::days(d));
            let issued = service
                .create(NewKeyRequest {
                    team_id: team,
                    name,
                    key_type,
                    created_by_user_id: created_by,
                    expires_at,
                })
                .await?;
            println!("✅ Key created: {}", issued.key.id);
            println!("   Prefix: {}", issued.key.token_prefix);
            println!("   Token:  {}", issued.token.expose());
            println!("   Store this token now; it cannot be shown again.");
        }
        cli::KeyCommands::List { team } => {
            let keys = service.list_views(&team).await?;
            if keys.is_empty() {
                println!("No keys for team {}", team);
            }
            let now = service.now();
            for k in keys {
                let status = KeyStatus::evaluate(k.revoked_at, k.expires_at, now);
                print_view(&k, status);
            }
        }
        cli::KeyCommands::Revoke { team, id } => {
            let outcome = service.revoke(&team, id).await?;
            if outcome.not_found() {
                anyhow::bail!("key {} not found for team {}", id, team);
            }
            println!("🚫 Key revoked: {}", id);
        }
        cli::KeyCommands::Verify {
            token,
            team,
            no_touch,
        } => {
            let key = match team {
                Some(team) => service.authorize_for_team(&token, &team, !no_touch).await,
                None => service.verify(&token, !no_touch).await,
            }
            .map_err(|e| anyhow::anyhow!("{} ({})", e, e.code()))?;
            print_key(service, &key).await?;
        }
    }
    Ok(())
}

async fn print_key(service: &ApiKeyService, key: &ApiKey) -> anyhow::Result<()> {
    let view = service.view(key).await?;
    print_view(&view, key.status_at(service.now()));
    Ok(())
}

fn print_view(k: &ApiKeyView, status: KeyStatus) {
    println!(
        "{}  {:<24} {:<8} {:<14} {:<8} created {}",
        k.id,
        k.name,
        k.key_type,
        k.token_prefix,
        status,
        k.created_at.format("%Y-%m-%d %H:%M")
    );
}
