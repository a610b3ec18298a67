//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "atomwire",
    version,
    about = "Semantic retrieval over archived nuclear-industry news",
    long_about = "Atomwire ingests the article text an archive.org scraper hands off as CSV, splits it \
                  into sentence-bounded chunks, embeds the chunks with a local model, and answers \
                  free-text questions with the closest chunks and the sites they came from."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/atomwire/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the corpus from a scraper handoff file
    Build {
        /// CSV file of scraped documents (defaults to sources.file from config)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Ask a free-text question against the corpus
    Query {
        /// Query text
        query: String,

        /// Maximum number of results to return
        #[arg(short, long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
        limit: Option<usize>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,

        /// Print the assembled context block after the results
        #[arg(long)]
        context: bool,
    },

    /// Show corpus status and per-source coverage
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_query_parsing() {
        let cli = Cli::parse_from(["atomwire", "query", "reactor safety", "--limit", "3"]);
        match cli.command {
            Commands::Query {
                query,
                limit,
                json,
                context,
            } => {
                assert_eq!(query, "reactor safety");
                assert_eq!(limit, Some(3));
                assert!(!json);
                assert!(!context);
            }
            other => panic!("expected query command, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_limit_rejected() {
        let result = Cli::try_parse_from(["atomwire", "query", "reactor safety", "--limit", "0"]);
        assert!(result.is_err());
    }
}
