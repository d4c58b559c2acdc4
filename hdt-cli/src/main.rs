use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cmd;
mod exit_codes;
mod utils;

#[derive(Debug, Parser)]
#[command(name = "hdt", version, about = "HTTP API documentor & tester")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Emit one swagger-<vhost>.json per virtual host.
    Gendoc(CommonArgs),
    /// Build the test execution tree and print it.
    Compile(CommonArgs),
    /// Compile, then execute the plan against the live targets.
    Run(CommonArgs),
}

#[derive(Debug, Args, Clone)]
struct CommonArgs {
    /// Descriptor root directory.
    #[arg(long, value_name = "DIR")]
    indir: PathBuf,
    /// Output directory for generated documents (default: --indir).
    #[arg(long, value_name = "DIR")]
    outdir: Option<PathBuf>,
    /// JSON variable files overlaid onto the catalogue.
    #[arg(long, value_delimiter = ',', value_name = "FILE")]
    config: Vec<PathBuf>,
    /// Single variable overrides, applied last.
    #[arg(long = "var", value_name = "NAME=VALUE")]
    vars: Vec<String>,
    /// Test-name prefixes to select (matches API names and groups).
    #[arg(long, value_delimiter = ',', value_name = "PREFIX")]
    tests: Vec<String>,
    /// Log level: error|warn|info|debug|trace.
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log: String,
    /// Alias for --log trace.
    #[arg(short = 'v', long)]
    verbose: bool,
}

impl Command {
    fn common(&self) -> &CommonArgs {
        match self {
            Command::Gendoc(args) | Command::Compile(args) | Command::Run(args) => args,
        }
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            use clap::error::ErrorKind;
            let _ = e.print();
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exit_codes::SUCCESS,
                _ => exit_codes::USAGE,
            };
            std::process::exit(code);
        }
    };

    let args = cli.command.common();
    let level = if args.verbose { "trace" } else { args.log.as_str() };
    if !matches!(level, "error" | "warn" | "info" | "debug" | "trace") {
        eprintln!("error: invalid log level {level:?}");
        std::process::exit(exit_codes::USAGE);
    }
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(tracing_subscriber::EnvFilter::new(level))
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {e}");
            std::process::exit(exit_codes::ERRORS);
        }
    };

    let code = rt.block_on(async {
        match &cli.command {
            Command::Gendoc(args) => cmd::gendoc::gendoc_cmd(args),
            Command::Compile(args) => cmd::compile::compile_cmd(args),
            Command::Run(args) => cmd::run::run_cmd(args).await,
        }
    });
    std::process::exit(code);
}
