use clap::{Arg, ArgMatches, Command};

use crate::auth::crypto::{HasherConfig, MAX_MEMORY_KIB, MAX_PARALLELISM, MAX_TIME_COST};

pub const ARG_ARGON2_MEMORY_KIB: &str = "argon2-memory-kib";
pub const ARG_ARGON2_TIME_COST: &str = "argon2-time-cost";
pub const ARG_ARGON2_PARALLELISM: &str = "argon2-parallelism";

/// Build the KDF cost parameters. Parallelism defaults to the available CPUs.
#[must_use]
pub fn parse(matches: &ArgMatches) -> HasherConfig {
    let mut config = HasherConfig::new();
    if let Some(memory_kib) = matches.get_one::<u32>(ARG_ARGON2_MEMORY_KIB) {
        config = config.with_memory_kib(*memory_kib);
    }
    if let Some(time_cost) = matches.get_one::<u32>(ARG_ARGON2_TIME_COST) {
        config = config.with_time_cost(*time_cost);
    }
    if let Some(parallelism) = matches.get_one::<u32>(ARG_ARGON2_PARALLELISM) {
        config = config.with_parallelism(*parallelism);
    }
    config.normalize()
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ARGON2_MEMORY_KIB)
                .long(ARG_ARGON2_MEMORY_KIB)
                .help("Argon2 memory cost in KiB for new hashes")
                .env("ARRIVAL_ARGON2_MEMORY_KIB")
                .default_value("65536")
                .value_parser(clap::value_parser!(u32).range(8..=i64::from(MAX_MEMORY_KIB))),
        )
        .arg(
            Arg::new(ARG_ARGON2_TIME_COST)
                .long(ARG_ARGON2_TIME_COST)
                .help("Argon2 iterations for new hashes")
                .env("ARRIVAL_ARGON2_TIME_COST")
                .default_value("1")
                .value_parser(clap::value_parser!(u32).range(1..=i64::from(MAX_TIME_COST))),
        )
        .arg(
            Arg::new(ARG_ARGON2_PARALLELISM)
                .long(ARG_ARGON2_PARALLELISM)
                .help("Argon2 lanes for new hashes (default: available CPUs)")
                .env("ARRIVAL_ARGON2_PARALLELISM")
                .value_parser(clap::value_parser!(u32).range(1..=i64::from(MAX_PARALLELISM))),
        )
}
