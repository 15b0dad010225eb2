// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref(), cli.db_path.as_deref())?;

    match cli.command {
        Some(Commands::Init) => commands::cmd_init(&config),
        Some(Commands::Sync {
            snapshot,
            keep_absent,
        }) => commands::cmd_sync(&config, &snapshot, keep_absent).await,
        Some(Commands::Updates {
            snapshot,
            session,
            changed_limit,
            used_limit,
        }) => commands::cmd_updates(&config, &snapshot, session, changed_limit, used_limit).await,
        Some(Commands::List { unit }) => commands::cmd_list(&config, unit),
        Some(Commands::Diffs { since }) => commands::cmd_diffs(&config, since),
        Some(Commands::Load { snapshot }) => commands::cmd_load(&config, &snapshot).await,
        Some(Commands::ShellList) => commands::cmd_shell_list(&config).await,
        None => {
            // No command provided, show help
            println!("pkgwatch v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'pkgwatch --help' for usage information");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_updates_command() {
        let cli = Cli::try_parse_from([
            "pkgwatch",
            "--db-path",
            "/tmp/p.db",
            "updates",
            "--snapshot",
            "snap.json",
            "--session",
            "42",
        ])
        .unwrap();

        assert_eq!(cli.db_path.as_deref(), Some(std::path::Path::new("/tmp/p.db")));
        match cli.command {
            Some(Commands::Updates {
                session,
                changed_limit,
                ..
            }) => {
                assert_eq!(session, 42);
                assert_eq!(changed_limit, 30);
            }
            _ => panic!("expected updates command"),
        }
    }

    #[test]
    fn test_db_path_overrides_config() {
        let config =
            commands::load_config(None, Some(std::path::Path::new("/tmp/other.db"))).unwrap();
        assert_eq!(config.db_path, std::path::PathBuf::from("/tmp/other.db"));
    }
}
