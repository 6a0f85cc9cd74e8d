use clap::{builder::ValueParser, Arg, ArgAction, Command};

pub const ARG_VERBOSITY: &str = "verbosity";

/// Level names in verbosity order; `-v` counts index into this list.
const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// `ARRIVAL_LOG_LEVEL` takes either a level name or its position in [`LEVELS`].
fn parse_log_level(level: &str) -> Result<u8, String> {
    let level = level.trim();
    let position = match level.parse::<usize>() {
        Ok(count) => Some(count).filter(|count| *count < LEVELS.len()),
        Err(_) => LEVELS
            .iter()
            .position(|name| name.eq_ignore_ascii_case(level)),
    };
    position
        .and_then(|position| u8::try_from(position).ok())
        .ok_or_else(|| {
            format!(
                "invalid log level {level:?}, expected one of {}",
                LEVELS.join(", ")
            )
        })
}

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(parse_log_level)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Log verbosity, repeat -v or set a level name (default: error)")
            .env("ARRIVAL_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}
