#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use std::net::SocketAddr;

use tank_royale_server::config;
use tank_royale_server::logging;
use tank_royale_server::websocket;

/// Tank Royale -- authoritative real-time server for a 2D battle-royale arena game
#[derive(Parser, Debug)]
#[command(name = "tank-royale-server")]
#[command(about = "Authoritative server for a real-time 2D battle-royale game: matchmaking, fixed-tick simulation, and WebSocket fan-out")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load();

    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg).map_err(|e| anyhow::anyhow!("failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    let validation_result = config::validate_config_security(&cfg);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.port);
                println!("  Tick rate: {} Hz", cfg.engine.tick_rate_hz);
                println!("  Metrics auth required: {}", cfg.security.require_metrics_auth);
                println!("  WebSocket auth required: {}", cfg.security.require_websocket_auth);
                println!("  Default room size: {}", cfg.server.default_room_max_size);
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    validation_result?;

    logging::init_with_config(&cfg.logging);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!(%addr, "starting tank royale server");

    websocket::run_server(addr, cfg).await
}

#[cfg(test)]
mod cli_tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn default_no_flags() {
        let cli = Cli::try_parse_from(["tank-royale-server"]).unwrap();
        assert!(!cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn validate_config_long() {
        let cli = Cli::try_parse_from(["tank-royale-server", "--validate-config"]).unwrap();
        assert!(cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn validate_config_short() {
        let cli = Cli::try_parse_from(["tank-royale-server", "-c"]).unwrap();
        assert!(cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn print_config() {
        let cli = Cli::try_parse_from(["tank-royale-server", "--print-config"]).unwrap();
        assert!(!cli.validate_config);
        assert!(cli.print_config);
    }

    #[test]
    fn validate_and_print_config_conflict() {
        let result = Cli::try_parse_from(["tank-royale-server", "--validate-config", "--print-config"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("cannot be used with"));
    }

    #[test]
    fn help_contains_flags() {
        let result = Cli::try_parse_from(["tank-royale-server", "--help"]);
        assert!(result.is_err());
        let help_text = result.unwrap_err().to_string();
        assert!(help_text.contains("--validate-config"));
        assert!(help_text.contains("--print-config"));
        assert!(help_text.contains("-c"));
    }

    #[test]
    fn version() {
        let result = Cli::try_parse_from(["tank-royale-server", "--version"]);
        assert!(result.is_err());
    }
}
