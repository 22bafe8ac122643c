use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use snmp_gateway::collector::Scheduler;
use snmp_gateway::config::{AppConfig, Settings};
use snmp_gateway::gateway::{Gateway, InboundQueue, INBOUND_CAPACITY};
use snmp_gateway::logging::init_logging;
use snmp_gateway::routes::create_router;
use snmp_gateway::sink::JsonLinesSink;
use snmp_gateway::snmp::Snmp2Connector;

/// Шлюз опроса SNMP устройств
#[derive(Debug, Parser)]
#[command(name = "snmp-gateway", version, about)]
struct Args {
    /// Путь к YAML конфигурации шлюза
    #[arg(short, long, env = "SNMP_GATEWAY_CONFIG", default_value = "./gateway.yaml")]
    config: PathBuf,

    /// Не поднимать HTTP сервер для входящих запросов
    #[arg(long)]
    no_http: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let content = std::fs::read_to_string(&args.config)
        .with_context(|| format!("Не удалось прочитать файл: {}", args.config.display()))?;
    init_logging(&Settings::peek(&content).log_level);

    let config = AppConfig::from_yaml_str(&content)?;
    config.debug_config();

    let factory = Arc::new(Snmp2Connector::new(config.get_timeout()));
    let sink = Arc::new(JsonLinesSink::new());
    let scheduler = Scheduler::new(&config, factory, sink);

    let (queue, inbound) = InboundQueue::channel(INBOUND_CAPACITY, config.rpc_wait_limit());

    if !args.no_http {
        let listen = config.get_listen();
        let listener = tokio::net::TcpListener::bind(&listen)
            .await
            .with_context(|| format!("Не удалось открыть порт {}", listen))?;
        tracing::info!(listen = %listen, "HTTP сервер запущен");

        let router = create_router(queue.clone());
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!(error = %e, "HTTP сервер остановлен с ошибкой");
            }
        });
    }

    let gateway = Gateway::new(
        scheduler,
        inbound,
        config.tick_period(),
        Duration::from_secs(config.settings.rpc_timeout),
    );

    gateway
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Не удалось подписаться на Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    drop(queue);
    Ok(())
}
