//! Storefront account commands.
//!
//! # Usage
//!
//! ```bash
//! kec-cli user create -e asha@example.com -p 'long-password'
//! ```

use thiserror::Error;

use kec_storefront::services::auth::{AuthError, AuthService};

use super::{ConnectError, connect};

/// Errors from account commands.
#[derive(Debug, Error)]
pub enum UserCommandError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Create a storefront account with a password.
pub async fn create(email: &str, password: &str) -> Result<(), UserCommandError> {
    let pool = connect().await?;
    let user = AuthService::new(&pool).register(email, password).await?;

    tracing::info!(user_id = %user.id, "User created");
    #[allow(clippy::print_stdout)]
    {
        println!("Created user {} ({})", user.id, user.email);
    }
    Ok(())
}
