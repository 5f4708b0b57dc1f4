mod api;
mod gateway;
#[cfg(test)]
mod testing;

use anyhow::Result;
use autoreply_core::{
    config::{self, Config},
    rules::format_response,
    session::SessionId,
    traits::ConnectionFactory,
};
use autoreply_store::JsonStore;
use clap::{Parser, Subcommand};
use gateway::{Gateway, SessionRegistry};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(
    name = "autoreply",
    version,
    about = "Keyword auto-responder for multiple WhatsApp sessions"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml", env = "AUTOREPLY_CONFIG")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Link the configured sessions and start answering messages.
    Start,
    /// Show configuration and persisted state per session.
    Status,
    /// List a session's keyword rules.
    Keywords {
        /// Session id, as configured in [[sessions]].
        session: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;
    let notice = missing_config_notice(&cli.config);

    match cli.command {
        Commands::Start => {
            let _guard = init_logging(&cfg, true)?;
            if let Some(notice) = &notice {
                info!("{notice}");
            }

            let data_dir = cfg.data_dir();
            let store = JsonStore::open(&data_dir).await?;
            let registry = Arc::new(SessionRegistry::load(store, &cfg.sessions).await?);
            let factory = build_factory(&cfg)?;

            println!("autoreply: starting {} session(s)...", cfg.sessions.len());
            let gw = Arc::new(Gateway::new(registry, factory, &cfg)?);
            gw.run().await?;
        }
        Commands::Status => {
            let _guard = init_logging(&cfg, false)?;
            if let Some(notice) = &notice {
                info!("{notice}");
            }
            print_status(&cli.config, &cfg).await?;
        }
        Commands::Keywords { session } => {
            let _guard = init_logging(&cfg, false)?;
            if let Some(notice) = &notice {
                info!("{notice}");
            }
            print_keywords(&cfg, &SessionId::new(session)).await?;
        }
    }

    Ok(())
}

/// Message to log once logging is up when the config file is absent.
fn missing_config_notice(path: &str) -> Option<String> {
    (!Path::new(path).exists()).then(|| format!("Config file not found at {path}, using defaults"))
}

/// Log to stdout and, for the long-running service, to a daily rolling file
/// under `<data_dir>/logs`. `RUST_LOG` overrides the configured level.
fn init_logging(cfg: &Config, to_file: bool) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.autoreply.log_level));
    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);

    if !to_file {
        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .init();
        return Ok(None);
    }

    let log_dir = cfg.data_dir().join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|e| {
        anyhow::anyhow!("failed to create log directory {}: {e}", log_dir.display())
    })?;
    let appender = tracing_appender::rolling::daily(&log_dir, "autoreply.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
    Ok(Some(guard))
}

/// Build the connection backend.
#[cfg(feature = "whatsapp")]
fn build_factory(cfg: &Config) -> Result<Arc<dyn ConnectionFactory>> {
    use autoreply_channels::whatsapp::WhatsAppFactory;
    Ok(Arc::new(WhatsAppFactory::new(
        cfg.whatsapp.clone(),
        cfg.data_dir(),
    )))
}

#[cfg(not(feature = "whatsapp"))]
fn build_factory(_cfg: &Config) -> Result<Arc<dyn ConnectionFactory>> {
    anyhow::bail!("autoreply was built without the `whatsapp` feature; no connection backend available")
}

async fn print_status(config_path: &str, cfg: &Config) -> Result<()> {
    let data_dir = cfg.data_dir();
    println!("autoreply status\n");
    println!("Config: {config_path}");
    println!("Data dir: {}", data_dir.display());
    println!("Reset interval: {} min", cfg.reset.interval_minutes);
    println!(
        "API: {}",
        if cfg.api.enabled {
            format!(
                "http://{}:{} ({})",
                cfg.api.host,
                cfg.api.port,
                if cfg.api.api_key.is_empty() {
                    "no auth"
                } else {
                    "bearer auth"
                }
            )
        } else {
            "disabled".to_string()
        }
    );
    println!();

    let store = JsonStore::open(&data_dir).await?;
    for session in &cfg.sessions {
        let records = store.load_session(&session.id).await;
        println!("  {} [{}]", session.display_label(), session.id);
        println!("    linked: {}", yes_no(is_linked(&data_dir, &session.id)));
        println!("    keywords: {}", records.keywords.len());
        println!(
            "    default message: {}",
            if records.default_message.trim().is_empty() {
                "not set"
            } else {
                "set"
            }
        );
        println!("    greeted this period: {}", records.sent_defaults.len());
    }
    Ok(())
}

async fn print_keywords(cfg: &Config, session: &SessionId) -> Result<()> {
    if !cfg.sessions.iter().any(|s| &s.id == session) {
        anyhow::bail!("unknown session '{session}'. Check [[sessions]] in the config file.");
    }
    let store = JsonStore::open(cfg.data_dir()).await?;
    let rules = store.load_keywords(session).await;
    if rules.is_empty() {
        println!("No keywords for {session}.");
        return Ok(());
    }
    for (i, rule) in rules.iter().enumerate() {
        let image = rule.image.as_deref().is_some_and(|uri| !uri.is_empty());
        println!(
            "{i:>3}. {}{}\n     {}",
            rule.keyword,
            if image { " [image]" } else { "" },
            format_response(&rule.response).replace('\n', "\n     ")
        );
    }
    Ok(())
}

/// Whether the session has stored WhatsApp credentials.
fn is_linked(data_dir: &Path, session: &SessionId) -> bool {
    data_dir
        .join("sessions")
        .join(session.as_str())
        .join("whatsapp.db")
        .exists()
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_notice() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("config.toml");
        let missing = missing.to_string_lossy();
        assert_eq!(
            missing_config_notice(&missing),
            Some(format!("Config file not found at {missing}, using defaults"))
        );

        std::fs::write(dir.path().join("config.toml"), "").unwrap();
        assert!(missing_config_notice(&missing).is_none());
    }
}
