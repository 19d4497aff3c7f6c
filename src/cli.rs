use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "life-analyzer")]
#[command(author, version, about = "Telegram bot and HTTP API that scores photos with a vision LLM", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the HTTP API and the Telegram bot (default)
    Run {
        /// Serve only the HTTP API; no bot token is needed
        #[arg(long)]
        http_only: bool,
    },

    /// Apply database migrations and exit
    Migrate,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The subcommand to run; `run` when none was given.
    pub fn command(&self) -> Commands {
        match &self.command {
            Some(Commands::Run { http_only }) => Commands::Run { http_only: *http_only },
            Some(Commands::Migrate) => Commands::Migrate,
            None => Commands::Run { http_only: false },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_run() {
        let cli = Cli::try_parse_from(["life-analyzer"]).unwrap();
        assert_eq!(cli.command(), Commands::Run { http_only: false });
    }

    #[test]
    fn test_run_http_only() {
        let cli = Cli::try_parse_from(["life-analyzer", "run", "--http-only"]).unwrap();
        assert_eq!(cli.command(), Commands::Run { http_only: true });
    }

    #[test]
    fn test_migrate() {
        let cli = Cli::try_parse_from(["life-analyzer", "migrate"]).unwrap();
        assert_eq!(cli.command(), Commands::Migrate);
    }
}
