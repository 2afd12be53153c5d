mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::AppError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose, cli.global.log_json);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Logs go to stderr so `call` output stays pipeable. `RUST_LOG` wins over
/// the `-v` count.
fn init_tracing(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "warn,cloudgate=info",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    if let Command::Completions(ref args) = cli.command {
        use clap::CommandFactory;
        use clap_complete::generate;

        let mut cmd = Cli::command();
        generate(args.shell, &mut cmd, "cloudgate", &mut std::io::stdout());
        return Ok(());
    }

    let config = cloudgate_config::load_config(cli.global.config.as_deref())?;

    match cli.command {
        Command::Serve(args) => commands::serve::handle(args, &config).await,
        Command::Call(args) => commands::call::handle(args, &config).await,
        Command::Config(ref args) => commands::config_cmd::handle(args, &config, &cli.global),
        Command::Completions(_) => Ok(()),
    }
}
