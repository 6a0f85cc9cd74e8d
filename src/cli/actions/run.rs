use crate::cli::actions::{server, Action};
use anyhow::Result;

/// # Errors
/// Propagates the failure of the chosen action.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Server(args) => server::execute(args).await,
    }
}
