pub mod env;
pub mod server;
pub mod users;

// Single dispatch point lives in `run`.
mod run;

#[derive(Debug)]
pub enum Action {
    Users(users::Args),
    Server(server::Args),
    Env(env::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
