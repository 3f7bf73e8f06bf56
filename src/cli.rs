use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "coursebot")]
#[command(author, version, about = "Telegram bot that indexes and distributes course bundles", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot in normal mode
    Run {
        /// Use webhook mode (WEBHOOK_URL, PORT) instead of long polling
        #[arg(long)]
        webhook: bool,
    },

    /// Apply pending database migrations and exit
    Migrate,

    /// Demote users whose premium has expired and exit
    ExpirePremium,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_webhook() {
        let cli = Cli::try_parse_from(["coursebot", "run", "--webhook"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Run { webhook: true }));
    }

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::try_parse_from(["coursebot"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_kebab_case_subcommand() {
        let cli = Cli::try_parse_from(["coursebot", "expire-premium"]).unwrap();
        assert_eq!(cli.command, Some(Commands::ExpirePremium));
    }
}
