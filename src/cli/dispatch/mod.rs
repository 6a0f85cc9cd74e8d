//! Map validated CLI arguments to the action the binary runs.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{database, hasher, session, ARG_DSN, ARG_PORT};
use anyhow::{Context, Result};
use url::Url;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or the DSN is not a URL.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    Url::parse(&dsn).context("invalid ARRIVAL_DSN")?;

    let db_opts = database::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        db_password: db_opts.password,
        db_max_connections: db_opts.max_connections,
        session: session::parse(matches),
        hasher: hasher::parse(matches),
    }))
}
