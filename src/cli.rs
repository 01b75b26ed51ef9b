use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "devdeck")]
#[command(about = "devdeck - Run a local fleet of Java microservices in dependency order")]
pub struct Cli {
    /// Config file path (defaults to devdeck.yaml, searched upwards)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Working directory used to find the config file
    #[arg(short, long)]
    pub workdir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check the dependency graph for missing services and cycles
    Validate {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the startup order
    Order,
    /// Show each service's dependencies and dependents
    Deps,
    /// Start services, monitor them, and stop everything on Ctrl-C
    Up {
        /// Services to start together with their hard dependencies (defaults to all)
        services: Vec<String>,

        /// Start the members of a profile from devdeck.yaml
        #[arg(short, long, conflicts_with = "services")]
        profile: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_up_with_services_and_global_flags() {
        let cli = Cli::try_parse_from([
            "devdeck",
            "-c",
            "fleet/devdeck.yaml",
            "up",
            "gateway",
            "orders",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("fleet/devdeck.yaml")));
        match cli.command {
            Commands::Up { services, profile } => {
                assert_eq!(services, vec!["gateway", "orders"]);
                assert!(profile.is_none());
            }
            _ => panic!("expected up"),
        }
    }

    #[test]
    fn profile_conflicts_with_service_list() {
        assert!(Cli::try_parse_from(["devdeck", "up", "gateway", "--profile", "core"]).is_err());
        assert!(Cli::try_parse_from(["devdeck", "up", "--profile", "core"]).is_ok());
    }

    #[test]
    fn validate_json_flag() {
        let cli = Cli::try_parse_from(["devdeck", "validate", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Validate { json: true }));
    }
}
