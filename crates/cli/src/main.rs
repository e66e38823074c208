mod config;

use std::{net::SocketAddr, str::FromStr, sync::Arc, time::Duration};

use {
    clap::Parser,
    sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    fedlink_bindings::{BindingStore, BindingValidator, ChatProbe, SqliteBindingRecords},
    fedlink_federation::{FederationClient, FederationConfig},
    fedlink_gateway::{AppState, BroadcastEventSink, SqliteMessageLog},
    fedlink_relay::{
        ChatSender, FederationPort, MessageLog, MessageRelay, RelayEventSink, RelayIdentity,
    },
    fedlink_retry::{BackoffPolicy, RetryOrchestrator, RetryPolicy},
    fedlink_telegram::{CommandContext, TelegramChatProbe, TelegramSender},
};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "fedlink", about = "Fedlink — Telegram adapter for federated chat rooms")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, env = "FEDLINK_CONFIG", default_value = "fedlink.toml")]
    config: std::path::PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    /// Address to bind to (overrides config value).
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on (overrides config value).
    #[arg(long)]
    port: Option<u16>,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "fedlink starting");

    let mut config = config::load(&cli.config)?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    run(config).await
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    // An unreachable database at startup is fatal; everything downstream
    // depends on the durable binding records.
    let options =
        SqliteConnectOptions::from_str(&config.database.url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    SqliteBindingRecords::init(&pool).await?;
    SqliteMessageLog::init(&pool).await?;

    let retry = Arc::new(RetryOrchestrator::new(RetryPolicy {
        max_attempts: config.retry.max_attempts,
        backoff: BackoffPolicy {
            base_delay_ms: config.retry.base_delay_ms,
            max_delay_ms: config.retry.max_delay_ms,
        },
    }));

    let federation = Arc::new(FederationClient::new(
        FederationConfig {
            registry_url: config.federation.registry_url.clone(),
            platform: config.federation.platform.clone(),
            public_url: config.federation.public_url.clone(),
        },
        Arc::clone(&retry),
    )?);

    let bindings = Arc::new(BindingStore::new(Arc::new(SqliteBindingRecords::new(
        pool.clone(),
    ))));
    match bindings.warm().await {
        Ok(count) => info!(count, "binding cache warmed"),
        Err(e) => warn!(error = %e, "could not warm binding cache"),
    }

    let bot = fedlink_telegram::connect(&config.telegram).await?;
    let sender = Arc::new(TelegramSender::new(bot.clone()));
    let probe = Arc::new(TelegramChatProbe::new(bot.clone()));

    let log: Arc<dyn MessageLog> = Arc::new(SqliteMessageLog::new(pool));
    let events = Arc::new(BroadcastEventSink::default());

    let identity = if config.federation.platform == "telegram" {
        RelayIdentity::telegram()
    } else {
        RelayIdentity::new(config.federation.platform.clone(), None)
    };
    let relay = Arc::new(
        MessageRelay::new(
            identity,
            Arc::clone(&bindings),
            Arc::clone(&federation) as Arc<dyn FederationPort>,
            Arc::clone(&sender) as Arc<dyn ChatSender>,
            Arc::clone(&log),
        )
        .with_event_sink(Arc::clone(&events) as Arc<dyn RelayEventSink>),
    );

    // Registration and room re-announcement are best-effort: the registry
    // may come up after us, and chats keep working locally in the meantime.
    if let Err(e) = federation.register_platform().await {
        warn!(error = %e, "platform registration failed");
    }
    match bindings.list_active().await {
        Ok(active) => {
            for binding in active {
                if let Err(e) = federation
                    .announce_room(&binding.room_id, &binding.room_id)
                    .await
                {
                    warn!(room_id = %binding.room_id, error = %e, "room re-announcement failed");
                }
            }
        },
        Err(e) => warn!(error = %e, "could not list bindings for re-announcement"),
    }

    let cancel = CancellationToken::new();

    let validator = Arc::new(BindingValidator::new(
        Arc::clone(&bindings),
        probe as Arc<dyn ChatProbe>,
    ));
    let interval = match config.validation.interval_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    let validation_task = validator.spawn(
        Duration::from_secs(config.validation.startup_delay_secs),
        interval,
        cancel.clone(),
    );

    let commands = Arc::new(CommandContext {
        bindings: Arc::clone(&bindings),
        federation: Arc::clone(&federation),
        relay: Arc::clone(&relay),
    });
    let polling_task = fedlink_telegram::start_polling(
        bot,
        commands,
        Arc::clone(&relay),
        cancel.clone(),
    )
    .await?;

    let state = AppState {
        relay,
        log,
        retry,
        events,
    };
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let app = fedlink_gateway::build_app(state);

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                cancel.cancel();
            }
        });
    }

    fedlink_gateway::serve(app, addr, cancel.clone()).await?;

    cancel.cancel();
    validation_task.abort();
    polling_task.abort();
    info!("fedlink stopped");
    Ok(())
}
