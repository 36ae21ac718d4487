//! `smb-spk <request.toml> [config.toml]`
//!
//! Generates the requested SPK file on Horizons, retrieves it, and prints
//! the local path. On failure prints an explanation and exits nonzero.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use smb_spk::{Config, ConfigError, Disposition, EnvConfig, LogFormat, LoggingConfig, SpkRequest};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Parser)]
#[command(name = "smb-spk", version, about = "Generate and retrieve a Horizons small-body SPK file")]
struct Cli {
    /// Request file (TOML): format, object name, dates, elements, e-mail.
    #[arg(value_name = "REQUEST")]
    request: PathBuf,
    /// Configuration file (TOML). `SMB_SPK_*` variables override it.
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("smb-spk: {e}");
            return ExitCode::from(2);
        }
    };
    init_logging(&config.logging);

    let request = match SpkRequest::load(&cli.request) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("smb-spk: {e}");
            return ExitCode::from(2);
        }
    };

    match smb_spk::run(&request, &config).await {
        Disposition::Success { path } => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        failure => {
            eprintln!("{}", failure.explain().unwrap_or_default());
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config, ConfigError> {
    let config = match path {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    config.apply_env(&EnvConfig::default())
}

/// Install the subscriber. `RUST_LOG` takes precedence over the config.
fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Pretty => registry.with(fmt::layer().with_writer(std::io::stderr)).init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_required() {
        assert!(Cli::try_parse_from(["smb-spk"]).is_err());
    }

    #[test]
    fn config_is_optional() {
        let cli = Cli::try_parse_from(["smb-spk", "req.toml"]).unwrap();
        assert_eq!(cli.request, PathBuf::from("req.toml"));
        assert!(cli.config.is_none());

        let cli = Cli::try_parse_from(["smb-spk", "req.toml", "smb.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("smb.toml")));
    }

    #[test]
    fn help_is_not_a_request_path() {
        let err = Cli::try_parse_from(["smb-spk", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
