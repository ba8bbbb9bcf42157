use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::warn;

use lab_scan_rs::config::{
    ClientConfig, ServerConfig, DEFAULT_BIND, DEFAULT_NMAP_BIN, DEFAULT_SCAN_TIMEOUT_SECS,
    DEFAULT_TARGET, DEFAULT_UI_DIR,
};
use lab_scan_rs::logging::{self, LogFormat};
use lab_scan_rs::options::{command_preview, OptionSet, ScanOption};
use lab_scan_rs::orchestrator::{Orchestrator, Outcome, ResultsSurface};
use lab_scan_rs::render::{self, ResultsView, SCANNING_PLACEHOLDER};
use lab_scan_rs::types::{ScanResponse, ScanResult};
use lab_scan_rs::{client::HttpScanApi, server};

/// lab-scan-rs — lab-only nmap front end with a tiny web UI and a command-line client.
#[derive(Debug, Parser)]
#[command(name = "lab-scan-rs", version, about, long_about = None)]
struct Cli {
    /// Default log filter when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the scan service and web UI.
    Serve(ServeArgs),
    /// Print the command a set of options maps to.
    Preview(PreviewArgs),
    /// Ask a running service to scan and print the results.
    Scan(ScanArgs),
    /// List the available scan options.
    Options,
}

#[derive(Debug, Args)]
struct ServeArgs {
    /// Listen address.
    #[arg(long, env = "LAB_SCAN_BIND", default_value = DEFAULT_BIND)]
    bind: String,

    /// The only host this service will scan.
    #[arg(long, env = "LAB_SCAN_TARGET", default_value = DEFAULT_TARGET)]
    target: String,

    /// nmap binary name or path.
    #[arg(long, env = "LAB_SCAN_NMAP", default_value = DEFAULT_NMAP_BIN)]
    nmap: PathBuf,

    /// Per-scan timeout in seconds.
    #[arg(
        long = "scan-timeout-secs",
        env = "LAB_SCAN_TIMEOUT_SECS",
        default_value_t = DEFAULT_SCAN_TIMEOUT_SECS
    )]
    scan_timeout_secs: u64,

    /// Directory of static assets served as a fallback.
    #[arg(long = "ui-dir", env = "LAB_SCAN_UI_DIR", default_value = DEFAULT_UI_DIR)]
    ui_dir: PathBuf,
}

#[derive(Debug, Args)]
struct PreviewArgs {
    /// Target host shown at the end of the command.
    #[arg(long, default_value = DEFAULT_TARGET)]
    target: String,

    /// Option identifiers (comma-separated or repeated). Unknown ones are ignored.
    #[arg(long = "option", short = 'o', value_delimiter = ',')]
    options: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Html,
    Json,
}

#[derive(Debug, Args)]
struct ScanArgs {
    /// Base URL of the scan service.
    #[arg(long, env = "LAB_SCAN_SERVER", default_value_t = ClientConfig::default().server_url)]
    server: String,

    /// Option identifiers (comma-separated or repeated). Defaults apply when none are given.
    #[arg(long = "option", short = 'o', value_delimiter = ',')]
    options: Vec<String>,

    /// Send no options at all instead of the defaults.
    #[arg(long = "no-defaults", default_value_t = false)]
    no_defaults: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Also print the raw scanner output (text format).
    #[arg(long, default_value_t = false)]
    raw: bool,

    /// Give up on the request after this many seconds. Waits indefinitely by default.
    #[arg(long = "timeout-secs")]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_format)?;

    match cli.command {
        Command::Serve(args) => {
            let config = ServerConfig {
                bind: args.bind,
                target: args.target,
                nmap_bin: args.nmap,
                scan_timeout: Duration::from_secs(args.scan_timeout_secs),
                ui_dir: args.ui_dir,
            };
            server::spawn_server(config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Preview(args) => {
            println!("{}", command_preview(&args.options, &args.target));
            Ok(ExitCode::SUCCESS)
        }
        Command::Options => {
            print_options(&mut io::stdout().lock())?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Scan(args) => run_scan(args).await,
    }
}

async fn run_scan(args: ScanArgs) -> Result<ExitCode> {
    let options = if args.options.is_empty() && !args.no_defaults {
        OptionSet::defaults().identifiers()
    } else {
        args.options
    };

    let config = ClientConfig {
        server_url: args.server,
        request_timeout: args.timeout_secs.map(Duration::from_secs),
    };
    let api = HttpScanApi::new(&config).context("failed to build HTTP client")?;

    if args.format == OutputFormat::Text {
        match api.target().await {
            Ok(target) => println!("$ {}\n", command_preview(&options, &target)),
            Err(e) => warn!(error = %e, "could not fetch target for preview"),
        }
    }

    let surface = ConsoleSurface {
        format: args.format,
        raw: args.raw,
    };
    let orchestrator = Orchestrator::new(api, surface);
    match orchestrator.run(&options).await {
        Outcome::Displayed(_) => Ok(ExitCode::SUCCESS),
        Outcome::Failed(_) | Outcome::Ignored => Ok(ExitCode::FAILURE),
    }
}

fn print_options<W: Write>(w: &mut W) -> io::Result<()> {
    let id_w = ScanOption::ALL.iter().map(|o| o.id().len()).max().unwrap_or(0);
    let flag_w = ScanOption::ALL.iter().map(|o| o.flag().len()).max().unwrap_or(0);
    for opt in ScanOption::ALL {
        writeln!(
            w,
            "{} {:<id_w$}  {:<flag_w$}  {}",
            if opt.default_selected() { "*" } else { " " },
            opt.id(),
            opt.flag(),
            opt.description(),
        )?;
    }
    writeln!(w, "\n* selected by default")
}

/// Writes results to stdout in the requested format.
struct ConsoleSurface {
    format: OutputFormat,
    raw: bool,
}

impl ConsoleSurface {
    fn write_results(&self, result: &ScanResult, view: &ResultsView) -> io::Result<()> {
        let mut out = io::stdout().lock();
        match self.format {
            OutputFormat::Text => {
                render::write_text_report(&mut out, view)?;
                if self.raw {
                    writeln!(out, "\n{}", view.raw_text)?;
                }
            }
            OutputFormat::Html => {
                write!(out, "{}", render::summary_html(view))?;
                write!(out, "{}", render::ports_table_html(view))?;
            }
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut out, result)?;
                writeln!(out)?;
            }
        }
        out.flush()
    }

    fn write_error(&self, message: &str) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => {
                eprintln!("ERROR: {message}");
                Ok(())
            }
            OutputFormat::Html => {
                let mut out = io::stdout().lock();
                write!(out, "{}", render::error_html(message))?;
                out.flush()
            }
            OutputFormat::Json => {
                let mut out = io::stdout().lock();
                serde_json::to_writer_pretty(&mut out, &ScanResponse::failure(message))?;
                writeln!(out)
            }
        }
    }
}

impl ResultsSurface for ConsoleSurface {
    fn clear(&self) {
        if self.format == OutputFormat::Text {
            eprintln!("{SCANNING_PLACEHOLDER}");
        }
    }

    fn show_results(&self, result: &ScanResult, view: &ResultsView) {
        if let Err(e) = self.write_results(result, view) {
            warn!(error = %e, "failed to write results");
        }
    }

    fn show_error(&self, message: &str) {
        if let Err(e) = self.write_error(message) {
            warn!(error = %e, "failed to write error");
        }
    }
}
