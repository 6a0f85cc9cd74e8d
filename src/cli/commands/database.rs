use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_DB_PASSWORD: &str = "db-password";
pub const ARG_DB_MAX_CONNECTIONS: &str = "db-max-connections";

#[derive(Debug, Clone)]
pub struct Options {
    pub password: Option<SecretString>,
    pub max_connections: u32,
}

impl Options {
    /// Parse database arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the pool size is zero.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let max_connections = matches
            .get_one::<u32>(ARG_DB_MAX_CONNECTIONS)
            .copied()
            .unwrap_or(5);
        if max_connections == 0 {
            return Err(anyhow::anyhow!("--{ARG_DB_MAX_CONNECTIONS} must be at least 1"));
        }

        Ok(Self {
            password: matches
                .get_one::<String>(ARG_DB_PASSWORD)
                .filter(|v| !v.is_empty())
                .map(|v| SecretString::from(v.clone())),
            max_connections,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DB_PASSWORD)
                .long(ARG_DB_PASSWORD)
                .help("Database password, replaces the one in the DSN")
                .env("ARRIVAL_DB_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_DB_MAX_CONNECTIONS)
                .long(ARG_DB_MAX_CONNECTIONS)
                .help("Maximum number of pooled database connections")
                .env("ARRIVAL_DB_MAX_CONNECTIONS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
}
