use clap::Parser;
use tracing::Instrument;

use compliance_scheduler::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(reason) = cli.validate() {
        eprintln!("{reason}");
        eprintln!("{}", Cli::get_validation_help());
        std::process::exit(2);
    }

    let settings = cli::load_and_merge_config(&cli)?;
    cli::init_logger_from_settings(&settings)?;

    let span = tracing::info_span!("scheduler", app = %settings.application.name);
    if let Err(e) = cli::execute_command(&cli, settings).instrument(span).await {
        tracing::error!(error = ?e, "Command failed");
        return Err(e.into());
    }

    Ok(())
}
