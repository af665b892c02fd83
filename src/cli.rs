use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "wordzen")]
#[command(author, version, about = "Telegram bot that sells access to a book catalog by subscription", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot with long polling and the daily entitlement sweep
    Run,

    /// Run a single entitlement sweep pass and exit
    Sweep,

    /// Insert the configured promo codes into the database and exit
    SeedPromos,
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
    fn no_subcommand_means_default_run() {
        let cli = Cli::try_parse_from(["wordzen"]).unwrap();
        assert_eq!(cli.command, None);
    }

    #[test]
    fn rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["wordzen", "download"]).is_err());
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["wordzen", "run"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Run));

        let cli = Cli::try_parse_from(["wordzen", "sweep"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Sweep));

        let cli = Cli::try_parse_from(["wordzen", "seed-promos"]).unwrap();
        assert_eq!(cli.command, Some(Commands::SeedPromos));
    }
}
