use clap::Subcommand;
use discovery_core::backend::auth::{clear_token, load_token, store_token, TOKEN_ENV};
use discovery_core::{Config, HttpBackend};
use tracing::warn;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Store an access token issued by the auth service
    Login {
        /// Bearer token
        #[arg(long)]
        token: String,
    },
    /// End the server session and remove the stored token
    Logout,
    /// Check authentication status
    Status,
    /// Ask the auth service to renew the current session
    Refresh,
}

pub async fn run(action: AuthAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AuthAction::Login { token } => {
            let token = token.trim();
            if token.is_empty() {
                return Err("--token must not be empty".into());
            }
            store_token(token)?;
            println!("token stored");
        }
        AuthAction::Logout => {
            if let Some(token) = load_token()? {
                let backend = client()?.with_token(token);
                // The local token is removed even if the server cannot be reached.
                if let Err(e) = backend.logout().await {
                    warn!(error = %e, "server logout failed");
                }
            }
            clear_token()?;
            println!("logged out");
        }
        AuthAction::Status => {
            let from_env = std::env::var(TOKEN_ENV).is_ok_and(|t| !t.trim().is_empty());
            let token = load_token().unwrap_or_else(|e| {
                warn!(error = %e, "credential store unavailable");
                None
            });
            match token {
                Some(_) if from_env => println!("authenticated (via {TOKEN_ENV})"),
                Some(_) => println!("authenticated"),
                None => println!("not authenticated"),
            }
        }
        AuthAction::Refresh => {
            let token = load_token()?.ok_or("not logged in")?;
            client()?.with_token(token).refresh_session().await?;
            println!("session refreshed");
        }
    }
    Ok(())
}

fn client() -> Result<HttpBackend, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    Ok(HttpBackend::new(&config.api.base_url, config.timeout())?)
}
