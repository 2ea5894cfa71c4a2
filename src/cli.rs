use clap::{Parser, Subcommand};
use uuid::Uuid;

/// teamkeys: team-scoped API key service
#[derive(Parser, Debug)]
#[command(name = "teamkeys", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (defaults to TEAMKEYS_PORT)
        #[arg(short, long)]
        port: Option<u16>,
        /// Keep keys in memory instead of PostgreSQL (development only)
        #[arg(long)]
        memory: bool,
    },

    /// Manage API keys
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum KeyCommands {
    /// Issue a new key; the token is printed once
    Create {
        #[arg(long)]
        team: String,
        #[arg(long)]
        name: String,
        #[arg(long = "type")]
        key_type: Option<String>,
        #[arg(long)]
        created_by: Option<String>,
        /// Expire the key this many days from now
        #[arg(long)]
        expires_in_days: Option<i64>,
    },
    /// List keys for a team, newest first
    List {
        #[arg(long)]
        team: String,
    },
    /// Revoke a key
    Revoke {
        #[arg(long)]
        team: String,
        #[arg(long)]
        id: Uuid,
    },
    /// Check a token, optionally for a specific team
    Verify {
        #[arg(long, env = "TEAMKEYS_TOKEN")]
        token: String,
        #[arg(long)]
        team: Option<String>,
        /// Do not record last-used time
        #[arg(long)]
        no_touch: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    // Parsing reads no configuration, so `--help` and bad arguments are
    // reported before any secret lookup.
    #[test]
    fn test_parses_without_any_settings() {
        let cli = Cli::try_parse_from(["teamkeys", "key", "verify", "--token", "ak_x", "--no-touch"])
            .unwrap();
        match cli.command {
            Some(Commands::Key {
                command: KeyCommands::Verify { token, team, no_touch },
            }) => {
                assert_eq!(token, "ak_x");
                assert!(team.is_none());
                assert!(no_touch);
            }
            _ => panic!("expected key verify"),
        }

        let help = Cli::try_parse_from(["teamkeys", "--help"]).unwrap_err();
        assert_eq!(help.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
