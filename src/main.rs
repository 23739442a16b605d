mod commands;
mod directives;
mod gateway;
mod tools;

use clap::{Parser, Subcommand};
use sauti_channels::{console::ConsoleChannel, telegram::TelegramChannel};
use sauti_core::{
    config::{self, shellexpand},
    context::Context,
    error::with_timeout,
    traits::{Channel, Provider, Speech},
};
use sauti_memory::Store;
use sauti_providers::{
    duckduckgo::DuckDuckGo, extract::WebExtractor, gemini::GeminiProvider, speech::OpenAiSpeech,
    yahoo::YahooFinance,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "sauti",
    version,
    about = "Sauti: a persona chat agent with inline tools and reminders"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml", env = "SAUTI_CONFIG")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the agent on every enabled channel.
    Start,
    /// Check configuration and provider availability.
    Status,
    /// Send a one-shot message to the model.
    Ask {
        /// The message to send.
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;
    let _log_guard = init_tracing(&cfg)?;

    match cli.command {
        Commands::Start => {
            let provider = build_provider(&cfg)?;
            if !provider.is_available().await {
                warn!("provider '{}' did not answer the availability check", provider.name());
            }

            // Build channels.
            let mut channels: HashMap<String, Arc<dyn Channel>> = HashMap::new();

            if let Some(ref tg) = cfg.channel.telegram {
                if tg.enabled {
                    if tg.bot_token.is_empty() {
                        anyhow::bail!(
                            "Telegram is enabled but bot_token is empty. \
                             Set it in config.toml or TELEGRAM_BOT_TOKEN env var."
                        );
                    }
                    channels.insert(
                        "telegram".to_string(),
                        Arc::new(TelegramChannel::new(tg.clone())),
                    );
                }
            }

            if let Some(ref console) = cfg.channel.console {
                if console.enabled {
                    channels.insert("console".to_string(), Arc::new(ConsoleChannel::new(console)));
                }
            }

            if channels.is_empty() {
                anyhow::bail!("No channels enabled. Enable at least one channel in config.toml.");
            }

            // Build memory and tool backends.
            let store = Arc::new(Store::new(&cfg.memory).await?);
            let timeout = cfg.tools.timeout_secs;

            let speech: Option<Arc<dyn Speech>> = if cfg.voice.enabled {
                if cfg.voice.api_key.is_empty() {
                    warn!("voice replies enabled but no OpenAI API key is set; voice disabled");
                    None
                } else {
                    Some(Arc::new(OpenAiSpeech::new(
                        cfg.voice.api_key.clone(),
                        cfg.voice.model.clone(),
                        cfg.voice.voice.clone(),
                        timeout,
                    )))
                }
            } else {
                None
            };

            let backends = gateway::Backends {
                provider,
                profiles: store.clone(),
                history: store.clone(),
                reminders: store.clone(),
                search: Arc::new(DuckDuckGo::new(timeout, cfg.tools.media_pool)),
                market: Arc::new(YahooFinance::new(timeout)),
                extractor: Arc::new(WebExtractor::new(timeout, cfg.tools.extract_max_chars)),
                speech,
            };
            let settings = gateway::Settings::from_config(&cfg)?;

            info!("{} starting...", cfg.sauti.name);
            let gw = Arc::new(gateway::Gateway::new(backends, channels, settings));
            gw.run().await?;
        }
        Commands::Status => {
            println!("{} status\n", cfg.sauti.name);
            println!("Config: {}", cli.config);
            println!("Timezone: {}", cfg.sauti.timezone);
            println!("Default provider: {}", cfg.provider.default);

            match build_provider(&cfg) {
                Ok(provider) => println!(
                    "  {}: {}",
                    provider.name(),
                    if provider.is_available().await {
                        "available"
                    } else {
                        "unreachable"
                    }
                ),
                Err(e) => println!("  {}: {e}", cfg.provider.default),
            }
            println!();

            match cfg.channel.telegram {
                Some(ref tg) => println!(
                    "  telegram: {}",
                    if tg.enabled && !tg.bot_token.is_empty() {
                        "configured"
                    } else if tg.enabled {
                        "enabled but missing bot_token"
                    } else {
                        "disabled"
                    }
                ),
                None => println!("  telegram: not configured"),
            }
            println!(
                "  console: {}",
                if cfg.channel.console.as_ref().is_some_and(|c| c.enabled) {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            println!(
                "  voice: {}",
                if cfg.voice.enabled && !cfg.voice.api_key.is_empty() {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            println!(
                "  scheduler: {}",
                if cfg.scheduler.enabled {
                    format!("every {}s", cfg.scheduler.poll_interval_secs)
                } else {
                    "disabled".to_string()
                }
            );

            match Store::new(&cfg.memory).await {
                Ok(store) => {
                    let size = store.db_size().await.unwrap_or(0);
                    println!("  database: {} ({size} bytes)", shellexpand(&cfg.memory.db_path));
                }
                Err(e) => println!("  database: {e}"),
            }
        }
        Commands::Ask { message } => {
            if message.is_empty() {
                anyhow::bail!("no message provided. Usage: sauti ask <message>");
            }

            let prompt = message.join(" ");
            let provider = build_provider(&cfg)?;
            let gemini = cfg.provider.gemini.clone().unwrap_or_default();

            let mut context = Context::new(&prompt);
            context.system_prompt = cfg.sauti.persona.clone();
            context.grounding = gemini.grounding;
            let response =
                with_timeout(gemini.timeout_secs, "generation", provider.complete(&context))
                    .await?;
            println!("{}", response.text);
            let footer = response.sources_footer();
            if !footer.is_empty() {
                println!("\n{footer}");
            }
        }
    }

    Ok(())
}

/// Stdout plus a daily-rolling file under `{data_dir}/logs`.
fn init_tracing(cfg: &config::Config) -> anyhow::Result<WorkerGuard> {
    let log_dir = PathBuf::from(shellexpand(&cfg.sauti.data_dir)).join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, "sauti.log"));

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.sauti.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    Ok(guard)
}

/// Build the configured provider.
fn build_provider(cfg: &config::Config) -> anyhow::Result<Arc<dyn Provider>> {
    match cfg.provider.default.as_str() {
        "gemini" => {
            let gemini = cfg.provider.gemini.clone().unwrap_or_default();
            if gemini.api_key.is_empty() {
                anyhow::bail!(
                    "Gemini API key is empty. Set it in config.toml or GEMINI_API_KEY env var."
                );
            }
            Ok(Arc::new(GeminiProvider::from_config(
                gemini.api_key,
                gemini.model,
                gemini.timeout_secs,
            )))
        }
        other => anyhow::bail!("unsupported provider: {other}"),
    }
}
