/*
[INPUT]:  CLI arguments, YAML configuration file, OS shutdown signals
[OUTPUT]: Interactive log viewer or a one-shot log dump for one source
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

mod tui;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use tailpane::config::SourceConfig;
use tailpane::{AppConfig, dump_logs};
use tailpane_runtime::CommandRuntime;

const AD_HOC_SOURCE: &str = "cmd";
const PRESS_ENTER_TO_RETURN: &str = "Press enter to return";

#[derive(Parser, Debug)]
#[command(name = "tailpane", version, about = "Follow the logs of a local process")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    /// Source id to show; defaults to the ad-hoc command or the first configured source
    #[arg(long = "source", value_name = "ID")]
    source: Option<String>,
    /// Print the logs to stdout instead of opening the viewer
    #[arg(long = "dump")]
    dump: bool,
    #[arg(long = "dry-run")]
    dry_run: bool,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    #[arg(long = "log-file", value_name = "PATH", default_value = "tailpane.log")]
    log_file: PathBuf,
    /// Ad-hoc command registered as source "cmd"
    #[arg(last = true, value_name = "COMMAND")]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let interactive = !args.dump && !args.dry_run;
    let _log_guard = init_tracing(&args.log_level, interactive.then_some(args.log_file.as_path()))?;

    info!(
        config_path = ?args.config_path,
        dump = args.dump,
        dry_run = args.dry_run,
        "starting tailpane"
    );

    let mut config = load_config(args.config_path.as_deref())?;
    if let Some((program, rest)) = args.command.split_first() {
        config.sources.push(SourceConfig {
            id: AD_HOC_SOURCE.to_string(),
            command: program.clone(),
            args: rest.to_vec(),
            tty: false,
            restart_delay_ms: None,
        });
    }
    config.validate().context("validate config")?;
    let source = resolve_source(&args, &config)?;
    info!(source_count = config.sources.len(), source = %source, "configuration loaded");

    if args.dry_run {
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let runtime = Arc::new(CommandRuntime::new());
    for source in &config.sources {
        runtime
            .register(source.id.clone(), source.command_spec())
            .with_context(|| format!("start source {}", source.id))?;
    }

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    if args.dump {
        let report = dump_logs(runtime.as_ref(), &source, &config, io::stdout(), &shutdown)
            .await
            .context("dump logs")?;
        info!(lines = report.lines, exit = ?report.exit, "dump complete");
        prompt_to_return(&config)?;
    } else {
        tui::run(runtime.clone(), &source, &config, shutdown).await?;
    }

    for source in runtime.sources() {
        runtime.remove(&source);
    }
    Ok(())
}

/// Stderr for non-interactive runs; the viewer owns the terminal, so
/// interactive runs log to a file.
fn init_tracing(log_level: &str, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    let Some(path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init()
            .map_err(|err| anyhow!(err))
            .context("initialize tracing subscriber")?;
        return Ok(None);
    };

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .context("log file path must name a file")?;
    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(Some(guard))
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };
    let path_str = path.to_str().context("config path must be valid utf-8")?;
    AppConfig::from_file(path_str).context("load config")
}

fn resolve_source(args: &Cli, config: &AppConfig) -> Result<String> {
    if let Some(source) = &args.source {
        if config.source(source).is_none() {
            bail!("unknown source: {source}");
        }
        return Ok(source.clone());
    }
    if !args.command.is_empty() {
        return Ok(AD_HOC_SOURCE.to_string());
    }
    config
        .sources
        .first()
        .map(|source| source.id.clone())
        .context("no sources configured; pass --config or a command after --")
}

fn prompt_to_return(config: &AppConfig) -> Result<()> {
    if config.gui.return_immediately {
        return Ok(());
    }
    let mut stdout = io::stdout();
    write!(stdout, "\n\n\x1b[32m{PRESS_ENTER_TO_RETURN}\x1b[0m")?;
    stdout.flush()?;
    let mut line = String::new();
    if let Err(err) = io::stdin().lock().read_line(&mut line) {
        warn!(error = %err, "failed to read from stdin");
    }
    Ok(())
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
