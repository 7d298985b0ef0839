use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

mod cmd;
mod complete;
mod config;
mod host;
mod interp;
mod lexer;
mod remote;
mod utils;

use cmd::format::StyleOptions;
use interp::Interpreter;
use remote::HttpService;

/// fsterm - interactive terminal for a remote file/group service
///
/// Usage:
///   fsterm -s https://host/fs/                  interactive session
///   fsterm -s https://host/fs/ -c 'ls' -c 'pwd' run commands and exit
///
/// Global flags / env:
///   -v / -vv        Increase verbosity
///   -q / --quiet    Errors only
///   -s / --server   Service base URL (or FSTERM_SERVER env)
///   --config        YAML settings file (or FSTERM_CONFIG env)
///
/// Inside the terminal, `help` lists the commands and `help <prefix>`
/// narrows the list. Tab completes command names and remote paths.
#[derive(Parser, Debug)]
#[command(
    name = "fsterm",
    version,
    author,
    about = "fsterm - interactive command terminal for a remote file/group administration service",
    propagate_version = true
)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence all non-error logging
    #[arg(short, long)]
    quiet: bool,

    /// Service base URL (http or https)
    #[arg(short = 's', long = "server", value_name = "URL")]
    server: Option<String>,

    /// YAML settings file
    #[arg(long, env = "FSTERM_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Lines per pager screen
    #[arg(long, value_name = "N")]
    rows: Option<usize>,

    /// Print long output without pausing
    #[arg(long)]
    no_pager: bool,

    /// Prompt text
    #[arg(long, value_name = "TEXT")]
    prompt: Option<String>,

    /// Starting working directory
    #[arg(long, value_name = "PATH")]
    home: Option<String>,

    /// Run a command line and exit (repeatable, run in order)
    #[arg(short = 'c', long = "command", value_name = "LINE")]
    commands: Vec<String>,
}

impl Cli {
    fn overrides(&self) -> config::Overrides {
        config::Overrides {
            config: self.config.clone(),
            server: self.server.clone(),
            prompt: self.prompt.clone(),
            rows: self.rows,
            no_pager: self.no_pager,
            home: self.home.clone(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = utils::derive_level(cli.verbose, cli.quiet);
    utils::init_logging(level);

    let settings = match config::load(&cli.overrides()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Invalid configuration: {e:#}");
            std::process::exit(2);
        }
    };
    let Some(server) = settings.server.clone() else {
        eprintln!("No service URL: pass -s/--server or set {}", config::SERVER_ENV);
        std::process::exit(2);
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;

    runtime.block_on(async {
        let service = HttpService::new(server.clone(), Duration::from_secs(settings.timeout_secs))
            .with_context(|| format!("creating client for {server}"))?;
        let registry = cmd::builtin::registry().context("building command table")?;
        tracing::debug!(%server, commands = registry.all().len(), "terminal ready");
        let interp = Interpreter::new(registry, &settings, Rc::new(service), StyleOptions::detect());

        if cli.commands.is_empty() {
            host::run_interactive(interp).await
        } else {
            host::run_batch(interp, &cli.commands).await
        }
    })
}
