//! Device login credentials.
//!
//! The library never reads the environment on its own; the binary calls
//! [`Credentials::from_env`] once and passes the result down.

use std::fmt;

use crate::error::{Error, Result};

pub const PRIMARY_USERNAME_VAR: &str = "PRIMARY_USERNAME";
pub const PRIMARY_PASSWORD_VAR: &str = "PRIMARY_PASSWORD";
pub const FALLBACK_USERNAME_VAR: &str = "FALLBACK_USERNAME";
pub const FALLBACK_PASSWORD_VAR: &str = "FALLBACK_PASSWORD";

/// A username/password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Login {
    pub username: String,
    password: String,
}

impl Login {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Login")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Primary login plus an optional fallback tried when the primary is
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub primary: Login,
    pub fallback: Option<Login>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            primary: Login::new(username, password),
            fallback: None,
        }
    }

    pub fn builder() -> CredentialsBuilder {
        CredentialsBuilder::default()
    }

    pub fn with_fallback(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.fallback = Some(Login::new(username, password));
        self
    }

    /// Logins in the order they should be tried.
    pub fn logins(&self) -> impl Iterator<Item = &Login> {
        std::iter::once(&self.primary).chain(self.fallback.iter())
    }

    /// Reads `PRIMARY_USERNAME`/`PRIMARY_PASSWORD` and, if both are set,
    /// `FALLBACK_USERNAME`/`FALLBACK_PASSWORD` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let mut builder = Self::builder();
        if let Some(user) = get(PRIMARY_USERNAME_VAR) {
            builder = builder.username(user);
        }
        if let Some(pass) = get(PRIMARY_PASSWORD_VAR) {
            builder = builder.password(pass);
        }
        if let (Some(user), Some(pass)) = (get(FALLBACK_USERNAME_VAR), get(FALLBACK_PASSWORD_VAR)) {
            builder = builder.fallback(user, pass);
        }
        builder.build()
    }
}

/// Builder for [`Credentials`].
#[derive(Debug, Default)]
pub struct CredentialsBuilder {
    username: Option<String>,
    password: Option<String>,
    fallback: Option<Login>,
}

impl CredentialsBuilder {
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn fallback(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.fallback = Some(Login::new(username, password));
        self
    }

    pub fn build(self) -> Result<Credentials> {
        let username = self.username.ok_or_else(|| {
            Error::MissingCredentials(format!("{PRIMARY_USERNAME_VAR} must be set"))
        })?;
        let password = self.password.ok_or_else(|| {
            Error::MissingCredentials(format!("{PRIMARY_PASSWORD_VAR} must be set"))
        })?;
        Ok(Credentials {
            primary: Login::new(username, password),
            fallback: self.fallback,
        })
    }
}
