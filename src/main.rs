//! vlanprobe - validate switch-port VLAN changes end to end
//!
//! This is the main entry point for the vlanprobe CLI.

mod cli;

use anyhow::Result;
use cli::commands::CommandContext;
use cli::{Cli, Commands};
use vlanprobe::config::Config;
use vlanprobe::telemetry::LoggingBuilder;

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    // Device credentials may come from a .env file in the working directory
    dotenvy::dotenv().ok();

    // Parse command line arguments
    let cli = Cli::parse_args();

    let exit_code = match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            report_error(&cli, &e);
            exit_code_for(&e)
        }
    };

    std::process::exit(exit_code);
}

async fn run(cli: &Cli) -> Result<i32> {
    // Load configuration
    let config = Config::load(cli.config.as_deref())?;

    init_logging(cli, &config)?;

    if cli.verbosity() >= 2 {
        eprintln!("vlanprobe v{VERSION}");
    }

    // Create command context
    let mut ctx = CommandContext::new(cli, config);

    // Execute the appropriate command
    let exit_code = match &cli.command {
        Commands::Run(args) => args.execute(&mut ctx).await?,
        Commands::Validate(args) => args.execute(&mut ctx).await?,
        Commands::Audit(args) => args.execute(&mut ctx).await?,
        Commands::Compare(args) => args.execute(&mut ctx).await?,
    };

    ctx.output.flush();
    Ok(exit_code)
}

/// Initialize logging from the configured level, or the verbosity count
fn init_logging(cli: &Cli, config: &Config) -> Result<()> {
    let mut builder = LoggingBuilder::new()
        .with_verbosity(cli.verbosity())
        .with_format(config.logging.format)
        .with_ansi(!cli.no_color && std::env::var_os("NO_COLOR").is_none());

    if let Some(level) = config.logging.level {
        if cli.verbosity() == 0 {
            builder = builder.with_level(level);
        }
    }
    if let Some(file) = &config.logging.file {
        builder = builder.with_file_output(file);
    }

    builder.init()?;
    Ok(())
}

fn report_error(cli: &Cli, error: &anyhow::Error) {
    if cli.is_json() {
        let obj = serde_json::json!({
            "type": "error",
            "message": format!("{error:#}"),
        });
        eprintln!("{obj}");
    } else {
        eprintln!("ERROR: {error:#}");
    }
}

/// Map a failure to the exit status its crate error assigns, or 1.
fn exit_code_for(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<vlanprobe::Error>()
        .map_or(1, vlanprobe::Error::exit_code)
}
