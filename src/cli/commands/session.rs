use clap::{Arg, ArgMatches, Command};
use std::time::Duration;

use crate::auth::session::{MAX_LIFETIME, MAX_SWEEP_INTERVAL};
use crate::auth::SessionConfig;

pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_SWEEP_SECONDS: &str = "session-sweep-seconds";

/// Build the session configuration; zero values are raised by `normalize`.
#[must_use]
pub fn parse(matches: &ArgMatches) -> SessionConfig {
    let seconds = |id: &str, default: u64| matches.get_one::<u64>(id).copied().unwrap_or(default);

    SessionConfig::new()
        .with_lifetime(Duration::from_secs(seconds(ARG_SESSION_TTL_SECONDS, 900)))
        .with_sweep_interval(Duration::from_secs(seconds(ARG_SESSION_SWEEP_SECONDS, 30)))
        .normalize()
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session lifetime in seconds (at most 30 days), renewed by every request")
                .env("ARRIVAL_SESSION_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_LIFETIME.as_secs())),
        )
        .arg(
            Arg::new(ARG_SESSION_SWEEP_SECONDS)
                .long(ARG_SESSION_SWEEP_SECONDS)
                .help("Interval between sweeps of expired sessions, in seconds")
                .env("ARRIVAL_SESSION_SWEEP_SECONDS")
                .default_value("30")
                .value_parser(clap::value_parser!(u64).range(..=MAX_SWEEP_INTERVAL.as_secs())),
        )
}
