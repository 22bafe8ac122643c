use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Инициализирует tracing. `RUST_LOG` имеет приоритет над уровнем из конфигурации.
pub fn init_logging(level: &str) {
    let default_filter = format!("snmp_gateway={level},tower_http=info,warn");

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init();
}
