use crate::cli::actions::{Action, env, server, users};
use anyhow::Result;

/// Execute the provided action.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Users(args) => users::execute(args).await,
        Action::Server(args) => server::execute(args).await,
        Action::Env(args) => env::execute(args),
    }
}
