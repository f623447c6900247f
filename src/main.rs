use clap::Parser;
use color_eyre::Result;
use postboard::{app, config, logging};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "postboard")]
#[command(about = "A terminal client for a paginated posts API")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./postboard.yaml, then $XDG_CONFIG_HOME/postboard/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Base URL of the posts API (overrides config and POSTBOARD_API_URL)
  #[arg(short, long)]
  url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Override API URL if specified on command line
  if let Some(url) = args.url {
    config.api.url = url;
  }
  config.validate()?;

  let _log_guard = logging::init(&config)?;

  // Initialize and run the app
  let mut app = app::App::new(config)?;
  app.run().await?;

  Ok(())
}
