use clap::Parser;

/// Import job dispatcher for Airtable syncs.
#[derive(Debug, Parser)]
#[command(name = "atsync-backend", version)]
pub struct CliArgs {
    /// Path to configuration file (overrides ATSYNC_CONFIG_PATH env var)
    #[arg(short = 'c', long = "config-path", value_name = "PATH")]
    pub config_path: Option<String>,
}

impl CliArgs {
    /// Config file path: CLI flag first, then environment.
    pub fn resolve_config_path(&self) -> Option<String> {
        self.config_path
            .clone()
            .or_else(|| std::env::var("ATSYNC_CONFIG_PATH").ok())
            .filter(|p| !p.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_flags() {
        let args = CliArgs::parse_from(["atsync-backend", "-c", "a.toml"]);
        assert_eq!(args.config_path.as_deref(), Some("a.toml"));

        let args = CliArgs::parse_from(["atsync-backend", "--config-path=b.yaml"]);
        assert_eq!(args.config_path.as_deref(), Some("b.yaml"));
    }

    #[test]
    fn flag_wins_over_env() {
        let args = CliArgs::parse_from(["atsync-backend", "--config-path", "cli.toml"]);
        assert_eq!(args.resolve_config_path().as_deref(), Some("cli.toml"));
    }
}
