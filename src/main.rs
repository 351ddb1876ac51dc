use calima::domain::settings::SettingsService;
use calima::infrastructure::logging;
use calima::presentation::cli::{self, Cli};
use clap::Parser;
use tracing::debug;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = SettingsService::new(cli.config.clone())?;

    // Initialize logging system
    let _guard = logging::init_logger(&settings.get().log_settings, cli.verbose)?;
    debug!("Settings loaded from {}", settings.path().display());

    cli::run(cli, &mut settings).await
}
