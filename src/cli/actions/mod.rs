pub mod server;

mod run;

/// What the binary does once its arguments are parsed.
#[derive(Debug)]
pub enum Action {
    /// Serve the rank and session API until a shutdown signal arrives.
    Server(server::Args),
}

impl Action {
    /// # Errors
    /// Returns an error if the database pool cannot be built, the rank hierarchy
    /// cannot be loaded or the listener fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
