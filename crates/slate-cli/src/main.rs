use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use slate_agent::{Dispatcher, LogReplyGenerator, SessionContext};
use slate_canvas::{BoardSummary, RenderOptions, render_png};
use slate_channels::MemoryChannel;
use slate_channels::replay::parse_recording;
use slate_core::config::{Config, LoggingConfig};
use slate_core::protocol::parse_project;
use slate_core::session::SessionMetadata;
use slate_core::types::WhiteboardProject;
use slate_tools::CapabilityTable;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

#[derive(Parser)]
#[command(
    name = "slate",
    about = "Shared whiteboard tutor agent: board rendering, feedback and teacher actions",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a board snapshot to PNG
    Render {
        /// Project JSON (a bare project or a `project` wire message)
        #[arg(long)]
        project: PathBuf,

        /// Output PNG path
        #[arg(long)]
        out: PathBuf,

        /// Canvas width (default: from config)
        #[arg(long)]
        width: Option<u32>,

        /// Canvas height (default: from config)
        #[arg(long)]
        height: Option<u32>,
    },

    /// Print the text summary the agent would see for a board
    Summarize {
        #[arg(long)]
        project: PathBuf,

        /// Change label to report
        #[arg(long, default_value = "requested")]
        action: String,
    },

    /// Feed a JSON-lines recording through a session
    Replay {
        /// Recording file
        #[arg(long)]
        input: PathBuf,

        /// Local participant identity
        #[arg(long, default_value = "agent")]
        identity: String,

        /// Session role when no metadata is given
        #[arg(long, default_value = "student")]
        role: String,

        /// Raw session metadata JSON
        #[arg(long)]
        metadata: Option<String>,

        /// How long to keep the session open after the last packet, in ms
        /// (default: debounce interval plus one second)
        #[arg(long)]
        linger_ms: Option<u64>,
    },

    /// Print the capability definitions offered to the model
    Capabilities,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a specific config value
    Get { key: String },
    /// Check the configuration for problems
    Validate,
}

fn init_logging(logging: Option<&LoggingConfig>, verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match (verbose, logging.and_then(|l| l.level.as_deref())) {
            (true, _) => "debug",
            (false, Some(level)) => level,
            (false, None) => "info",
        };
        let mut directives = vec![level.to_string()];
        if let Some(logging) = logging {
            directives.extend(logging.filters.iter().cloned());
        }
        EnvFilter::new(directives.join(","))
    });

    let writer = match logging.map(|l| l.output.as_str()) {
        Some("stdout") => BoxMakeWriter::new(std::io::stdout),
        _ => BoxMakeWriter::new(std::io::stderr),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer);
    if logging.is_some_and(|l| l.format == "json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_project(path: &Path) -> anyhow::Result<WhiteboardProject> {
    let data = std::fs::read(path)?;
    match parse_project(&data) {
        Ok(project) => Ok(project),
        Err(wire_err) => serde_json::from_slice(&data).map_err(|e| {
            anyhow::anyhow!("{}: not a project message ({wire_err}) or project ({e})", path.display())
        }),
    }
}

async fn replay(
    config: Config,
    input: &Path,
    identity: String,
    metadata: SessionMetadata,
    linger: Duration,
) -> anyhow::Result<()> {
    let entries = parse_recording(&std::fs::read_to_string(input)?)?;
    let (channel, rx) = MemoryChannel::new(identity);
    let channel = Arc::new(channel);
    let ctx = SessionContext::new(Arc::new(config), metadata, channel.clone(), Arc::new(LogReplyGenerator));
    let dispatcher = tokio::spawn(Dispatcher::new(ctx.clone()).run(rx));

    tracing::info!(packets = entries.len(), "Replaying {}", input.display());
    for entry in &entries {
        tokio::time::sleep(entry.delay()).await;
        channel.inject(entry.to_packet()?);
    }
    tokio::time::sleep(linger).await;

    ctx.shutdown();
    dispatcher.abort();

    for packet in channel.published() {
        let kind = packet.message_type().unwrap_or_else(|| "?".into());
        println!("{}\t{kind}", packet.topic);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.map(PathBuf::from).unwrap_or_else(Config::config_path);
    let config = Config::load(&config_path)?;
    init_logging(config.logging.as_ref(), cli.verbose);

    match cli.command {
        Commands::Render {
            project,
            out,
            width,
            height,
        } => {
            let board = read_project(&project)?;
            let mut opts = RenderOptions::from(&config.render());
            opts.width = width.unwrap_or(opts.width);
            opts.height = height.unwrap_or(opts.height);
            let png = render_png(&board, &opts)
                .ok_or_else(|| anyhow::anyhow!("rendering {}x{} failed", opts.width, opts.height))?;
            std::fs::write(&out, &png)?;
            tracing::info!(bytes = png.len(), "Wrote {}", out.display());
        }
        Commands::Summarize { project, action } => {
            let board = read_project(&project)?;
            println!("{}", BoardSummary::from_project(&board).to_prompt(&action));
        }
        Commands::Replay {
            input,
            identity,
            role,
            metadata,
            linger_ms,
        } => {
            let metadata = match metadata {
                Some(raw) => SessionMetadata::parse(&raw),
                None => SessionMetadata::with_role(&role),
            };
            let linger = linger_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.debounce() + Duration::from_secs(1));
            replay(config, &input, identity, metadata, linger).await?;
        }
        Commands::Capabilities => {
            let table = CapabilityTable::new(SessionMetadata::default());
            println!("{}", serde_json::to_string_pretty(&table.to_llm_tools())?);
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("Config: {}", config_path.display());
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigAction::Get { key } => match config.get_path(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => anyhow::bail!("no config value at '{key}'"),
            },
            ConfigAction::Validate => {
                let (warnings, errors) = config.validate();
                for warning in &warnings {
                    println!("warning: {warning}");
                }
                for error in &errors {
                    println!("error: {error}");
                }
                if !errors.is_empty() {
                    anyhow::bail!("{} configuration error(s)", errors.len());
                }
                println!("Config OK");
            }
        },
    }

    Ok(())
}
