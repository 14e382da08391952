use std::path::PathBuf;

use clap::Parser;
use fidlygrid::config::{Config, DEFAULT_HOST, DEFAULT_PORT};
use fidlygrid::daemon;
use fidlygrid::error::Result;

#[derive(Parser, Debug)]
#[command(name = "fidlygrid")]
#[command(about = "FidlyGrid task, goal and focus timer API server")]
#[command(version)]
struct Cli {
    /// JSON config file; flags and environment variables override its values.
    #[arg(long, env = "FIDLYGRID_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "HOST")]
    host: Option<String>,

    #[arg(long, env = "PORT")]
    port: Option<u16>,

    #[arg(long, env = "DATABASE_URL")]
    db: Option<String>,

    #[arg(long, env = "THEME_PATH")]
    theme: Option<String>,

    /// Root directory for default data and theme paths.
    #[arg(long, env = "FIDLYGRID_HOME")]
    home: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<Config> {
        if let Some(home) = self.home {
            fidlygrid::runtime_paths::set_app_root_override(Some(home));
        }
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::convention_defaults(),
        };
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(db) = self.db {
            config.db_path = db;
        }
        if let Some(theme) = self.theme {
            config.theme_path = theme;
        }
        config.validate()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fidlygrid::logging::init_tracing("fidlygrid");
    let config = Cli::parse().into_config()?;
    tracing::debug!(
        default_host = DEFAULT_HOST,
        default_port = DEFAULT_PORT,
        "Resolved configuration for {}",
        config.bind_addr()
    );

    daemon::run_with_shutdown(config, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    })
    .await
}
