pub mod commands;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "c6admin")]
#[command(about = "C6Admin API - schema-driven admin backend")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP API")]
    Serve(commands::serve::ServeArgs),

    #[command(about = "Schema file utilities")]
    Schema {
        #[command(subcommand)]
        cmd: commands::schema::SchemaCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Serve(args) => commands::serve::handle(args).await,
        Commands::Schema { cmd } => commands::schema::handle(cmd, output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_and_schema_check() {
        let cli = Cli::try_parse_from(["c6admin", "serve", "--port", "8080", "--memory"]).unwrap();
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.port, Some(8080));
                assert!(args.memory);
            }
            _ => panic!("expected serve"),
        }

        let cli = Cli::try_parse_from(["c6admin", "--json", "schema", "check", "--dir", "a", "--dir", "b"]).unwrap();
        assert_eq!(OutputFormat::from_cli(&cli), OutputFormat::Json);
        match cli.command {
            Commands::Schema {
                cmd: commands::schema::SchemaCommands::Check { dirs },
            } => assert_eq!(dirs.len(), 2),
            _ => panic!("expected schema check"),
        }
    }

    #[test]
    fn seed_requires_memory() {
        assert!(Cli::try_parse_from(["c6admin", "serve", "--seed", "f.json"]).is_err());
    }
}
