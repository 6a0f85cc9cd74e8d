pub mod database;
pub mod hasher;
pub mod logging;
pub mod session;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_PORT: &str = "port";
pub const ARG_DSN: &str = "dsn";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("arrival")
        .about("Ranks, permissions and sessions for the Arrival network")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("ARRIVAL_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Database connection string, example: postgres://arrival@localhost:5432/arrival")
                .env("ARRIVAL_DSN")
                .required(true),
        );

    let command = database::with_args(command);
    let command = session::with_args(command);
    let command = hasher::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::time::Duration;

    const DSN: &str = "postgres://arrival@localhost:5432/arrival";

    const ENV_VARS: [&str; 10] = [
        "ARRIVAL_PORT",
        "ARRIVAL_DSN",
        "ARRIVAL_DB_PASSWORD",
        "ARRIVAL_DB_MAX_CONNECTIONS",
        "ARRIVAL_SESSION_TTL_SECONDS",
        "ARRIVAL_SESSION_SWEEP_SECONDS",
        "ARRIVAL_ARGON2_MEMORY_KIB",
        "ARRIVAL_ARGON2_TIME_COST",
        "ARRIVAL_ARGON2_PARALLELISM",
        "ARRIVAL_LOG_LEVEL",
    ];

    fn env_with(values: &[(&str, &'static str)]) -> Vec<(&'static str, Option<&'static str>)> {
        ENV_VARS
            .iter()
            .map(|name| {
                let value = values
                    .iter()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| *value);
                (*name, value)
            })
            .collect()
    }

    fn cleared() -> Vec<(&'static str, Option<&'static str>)> {
        env_with(&[])
    }

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "arrival");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Ranks, permissions and sessions for the Arrival network".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_defaults() {
        temp_env::with_vars(cleared(), || {
            let matches = new().get_matches_from(vec!["arrival", "--dsn", DSN]);

            assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(8080));
            assert_eq!(
                matches.get_one::<String>(ARG_DSN).map(String::as_str),
                Some(DSN)
            );

            let db = database::Options::parse(&matches).map_err(|e| e.to_string());
            assert!(db.as_ref().is_ok_and(|db| db.password.is_none()));
            assert_eq!(db.map(|db| db.max_connections), Ok(5));

            let sessions = session::parse(&matches);
            assert_eq!(sessions.lifetime(), Duration::from_secs(900));
            assert_eq!(sessions.sweep_interval(), Duration::from_secs(30));

            let hasher = hasher::parse(&matches);
            assert_eq!(hasher.memory_kib(), 65536);
            assert_eq!(hasher.time_cost(), 1);
            assert!(hasher.parallelism() >= 1);

            assert_eq!(
                matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                Some(0)
            );
        });
    }

    #[test]
    fn test_check_env() {
        let vars = env_with(&[
            ("ARRIVAL_PORT", "443"),
            ("ARRIVAL_DSN", DSN),
            ("ARRIVAL_DB_PASSWORD", "s3cret"),
            ("ARRIVAL_DB_MAX_CONNECTIONS", "12"),
            ("ARRIVAL_SESSION_TTL_SECONDS", "60"),
            ("ARRIVAL_SESSION_SWEEP_SECONDS", "0"),
            ("ARRIVAL_ARGON2_MEMORY_KIB", "19456"),
            ("ARRIVAL_ARGON2_TIME_COST", "2"),
            ("ARRIVAL_ARGON2_PARALLELISM", "1"),
            ("ARRIVAL_LOG_LEVEL", "info"),
        ]);

        temp_env::with_vars(vars, || {
            let matches = new().get_matches_from(vec!["arrival"]);

            assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(443));
            assert_eq!(
                matches.get_one::<String>(ARG_DSN).map(String::as_str),
                Some(DSN)
            );

            let db = database::Options::parse(&matches).map_err(|e| e.to_string());
            assert_eq!(
                db.as_ref()
                    .ok()
                    .and_then(|db| db.password.as_ref())
                    .map(|p| p.expose_secret().to_string()),
                Some("s3cret".to_string())
            );
            assert_eq!(db.map(|db| db.max_connections), Ok(12));

            let sessions = session::parse(&matches);
            assert_eq!(sessions.lifetime(), Duration::from_secs(60));
            // zero is raised to the minimum interval
            assert_eq!(sessions.sweep_interval(), Duration::from_secs(1));

            let hasher = hasher::parse(&matches);
            assert_eq!(hasher.memory_kib(), 19456);
            assert_eq!(hasher.time_cost(), 2);
            assert_eq!(hasher.parallelism(), 1);

            assert_eq!(
                matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                Some(2)
            );
        });
    }

    #[test]
    fn test_missing_dsn_is_an_error() {
        temp_env::with_vars(cleared(), || {
            let result = new().try_get_matches_from(vec!["arrival"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_parallelism_out_of_range() {
        temp_env::with_vars(cleared(), || {
            let result = new().try_get_matches_from(vec![
                "arrival",
                "--dsn",
                DSN,
                "--argon2-parallelism",
                "0",
            ]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_argon2_costs_out_of_range() {
        temp_env::with_vars(cleared(), || {
            for (flag, value) in [
                ("--argon2-time-cost", "0"),
                ("--argon2-time-cost", "65"),
                ("--argon2-time-cost", "4294967295"),
                ("--argon2-memory-kib", "1048577"),
            ] {
                let result =
                    new().try_get_matches_from(vec!["arrival", "--dsn", DSN, flag, value]);
                assert!(result.is_err(), "{flag} {value} must be rejected");
            }

            let matches = new().get_matches_from(vec![
                "arrival",
                "--dsn",
                DSN,
                "--argon2-time-cost",
                "64",
            ]);
            assert_eq!(hasher::parse(&matches).time_cost(), 64);
        });
    }

    #[test]
    fn test_session_ttl_out_of_range() {
        temp_env::with_vars(cleared(), || {
            for ttl in ["0", "18446744073709551615", "2592001"] {
                let result = new().try_get_matches_from(vec![
                    "arrival",
                    "--dsn",
                    DSN,
                    "--session-ttl-seconds",
                    ttl,
                ]);
                assert!(result.is_err(), "ttl {ttl} must be rejected");
            }

            let matches = new().get_matches_from(vec![
                "arrival",
                "--dsn",
                DSN,
                "--session-ttl-seconds",
                "2592000",
            ]);
            assert_eq!(
                session::parse(&matches).lifetime(),
                Duration::from_secs(2_592_000)
            );
        });
    }

    #[test]
    fn test_zero_pool_size_is_rejected() {
        temp_env::with_vars(cleared(), || {
            let matches = new().get_matches_from(vec![
                "arrival",
                "--dsn",
                DSN,
                "--db-max-connections",
                "0",
            ]);
            assert!(database::Options::parse(&matches).is_err());
        });
    }

    #[test]
    fn test_check_log_level_env() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            let vars = env_with(&[("ARRIVAL_LOG_LEVEL", level), ("ARRIVAL_DSN", DSN)]);
            temp_env::with_vars(vars, || {
                let matches = new().get_matches_from(vec!["arrival"]);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        for index in 0..5_usize {
            temp_env::with_vars(cleared(), || {
                let mut args = vec!["arrival".to_string(), "--dsn".to_string(), DSN.to_string()];
                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }

                let matches = new().get_matches_from(args);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }
}
