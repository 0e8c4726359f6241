//! Administrator check performed before a migration is allowed to run.

use anyhow::{Context, Result, anyhow};
use dialoguer::{Input, Password};

use crate::config::Credentials;
use crate::db::{DatabaseGateway, SqlValue};

/// Access level stored in `users.rights`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rights {
    User,
    Administrator,
    Inactive,
}

impl Rights {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "user" => Some(Rights::User),
            "administrator" => Some(Rights::Administrator),
            "inactive" => Some(Rights::Inactive),
            _ => None,
        }
    }
}

/// Digest stored in `users.password`: uppercase hex md5 of the clear text
pub fn password_digest(password: &str) -> String {
    format!("{:X}", md5::compute(password.as_bytes()))
}

/// Username and clear-text password of the operator running the patcher.
#[derive(Clone)]
pub struct Login {
    pub username: String,
    password: String,
}

impl std::fmt::Debug for Login {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Login")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Login {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Take the configured credentials, prompting for whatever is missing
    pub fn from_credentials(credentials: &Credentials) -> Result<Self> {
        let username = match &credentials.username {
            Some(username) => username.clone(),
            None => Input::<String>::new()
                .with_prompt("Highlander administrator username")
                .interact_text()?
                .trim()
                .to_string(),
        };
        if username.is_empty() {
            return Err(anyhow!("A username is required to update the database"));
        }

        let password = match &credentials.password {
            Some(password) => password.clone(),
            None => Password::new()
                .with_prompt(format!("Password for {}", username))
                .interact()?,
        };
        Ok(Self::new(username, password))
    }
}

/// Fail unless the login belongs to an active administrator
pub async fn require_administrator(db: &dyn DatabaseGateway, login: &Login) -> Result<()> {
    let row = db
        .query_with(
            "SELECT `rights` FROM `users` WHERE `username` = ? AND `password` = ?",
            &[
                SqlValue::from(login.username.as_str()),
                SqlValue::from(password_digest(&login.password)),
            ],
        )
        .await
        .context("Failed to check user rights")?
        .first()
        .ok_or_else(|| anyhow!("Wrong identifier or password."))?;

    match row.at(0).and_then(Rights::parse) {
        Some(Rights::Administrator) => {
            tracing::info!("Authenticated {} as administrator", login.username);
            Ok(())
        }
        Some(Rights::Inactive) => Err(anyhow!("User {} is inactive", login.username)),
        _ => Err(anyhow!(
            "Sorry, you must be administrator of the Highlander database"
        )),
    }
}
