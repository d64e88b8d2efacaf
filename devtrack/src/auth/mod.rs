//! Session boundary: register, login, logout and the "is a token stored" check.
//!
//! The list reconciler never talks to this module. The CLI consults it once
//! per invocation to build an authenticated [`HttpGateway`], and any
//! [`GatewayError::Unauthenticated`] from a resource call is handled the same
//! way as a missing token.

pub mod store;

pub use store::{Credentials, FileTokenStore, MemoryTokenStore, TokenStore};

use std::future::Future;
use std::path::PathBuf;

use devtrack_proto::dto::{AuthResponse, LoginDto, RegisterDto, UserInfo};
use reqwest::Method;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::gateway::http::{ApiClient, HttpGateway};

/// Minimum display name length after trimming.
pub const MIN_NAME_LENGTH: usize = 3;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Local rejection of a registration form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    /// Trimmed name shorter than [`MIN_NAME_LENGTH`].
    #[error("name must be at least {MIN_NAME_LENGTH} characters")]
    NameTooShort,
    /// Empty e-mail address.
    #[error("email is required")]
    EmailRequired,
    /// Password shorter than [`MIN_PASSWORD_LENGTH`].
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    PasswordTooShort,
    /// Password and confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,
}

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The form was rejected locally; no request was made.
    #[error(transparent)]
    Validation(#[from] RegisterError),
    /// The auth endpoint failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    /// The server rejected the e-mail and password.
    #[error("invalid email or password")]
    InvalidCredentials,
    /// Login succeeded but the response carried no token.
    #[error("login response did not include a token")]
    MissingToken,
    /// The token file could not be read or written.
    #[error("failed to access credentials at {path}: {source}")]
    Storage {
        /// Token file location.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// The token file exists but is not valid.
    #[error("credentials at {path} are invalid: {source}")]
    CorruptCredentials {
        /// Token file location.
        path: PathBuf,
        /// Decode failure.
        source: serde_json::Error,
    },
}

impl AuthError {
    /// Whether the user has to (re-)authenticate to proceed.
    #[must_use]
    pub const fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Gateway(GatewayError::Unauthenticated))
    }
}

/// Input of the registration form.
#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    /// Display name.
    pub name: String,
    /// Account e-mail address.
    pub email: String,
    /// Chosen password.
    pub password: String,
    /// Password typed a second time.
    pub confirm_password: String,
}

impl RegisterForm {
    /// Checks the form and builds the request body.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegisterError`] found, checking name, e-mail,
    /// password length and confirmation in that order.
    pub fn validate(&self) -> Result<RegisterDto, RegisterError> {
        let name = self.name.trim();
        if name.chars().count() < MIN_NAME_LENGTH {
            return Err(RegisterError::NameTooShort);
        }
        let email = self.email.trim();
        if email.is_empty() {
            return Err(RegisterError::EmailRequired);
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(RegisterError::PasswordTooShort);
        }
        if self.password != self.confirm_password {
            return Err(RegisterError::PasswordMismatch);
        }
        Ok(RegisterDto {
            email: email.to_string(),
            password: self.password.clone(),
            name: name.to_string(),
        })
    }
}

/// Outcome of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registered {
    /// The server issued a token; the user is now logged in.
    SignedIn(Option<UserInfo>),
    /// The account exists but the user must log in separately.
    LoginRequired,
}

/// Session-level operations, consumed only at session boundaries.
pub trait AuthGateway: Send + Sync {
    /// Validates the form locally, then creates the account.
    fn register(
        &self,
        form: &RegisterForm,
    ) -> impl Future<Output = Result<Registered, AuthError>> + Send;

    /// Exchanges credentials for a token and stores it.
    fn login(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Option<UserInfo>, AuthError>> + Send;

    /// Forgets the stored token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the token store cannot be cleared.
    fn logout(&self) -> Result<(), AuthError>;

    /// Whether a token is stored.
    fn is_authenticated(&self) -> bool;
}

/// [`AuthGateway`] over the REST API with a pluggable token store.
#[derive(Debug)]
pub struct Session<S> {
    api: ApiClient,
    store: S,
}

impl<S: TokenStore> Session<S> {
    /// Creates a session using `api` for requests and `store` for the token.
    pub const fn new(api: ApiClient, store: S) -> Self {
        Self { api, store }
    }

    /// Returns the stored credentials, if any.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the token store cannot be read.
    pub fn credentials(&self) -> Result<Option<Credentials>, AuthError> {
        self.store.load()
    }

    /// Builds a resource gateway authenticated with the stored token.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthenticated`] (wrapped) when no token is
    /// stored, or a storage error if it cannot be read.
    pub fn resource_gateway(&self) -> Result<HttpGateway, AuthError> {
        let credentials = self
            .store
            .load()?
            .ok_or(AuthError::Gateway(GatewayError::Unauthenticated))?;
        Ok(HttpGateway::new(self.api.clone(), credentials.token))
    }

    async fn post_auth<B: serde::Serialize + Sync>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<AuthResponse, AuthError> {
        let request = self
            .api
            .request(Method::POST, &["auth", endpoint], None)
            .json(body);
        Ok(self.api.fetch(request).await?)
    }
}

impl<S: TokenStore> AuthGateway for Session<S> {
    async fn register(&self, form: &RegisterForm) -> Result<Registered, AuthError> {
        let dto = form.validate()?;
        let response = self.post_auth("register", &dto).await?;
        tracing::info!(email = %dto.email, "account registered");
        match response.token {
            Some(token) => {
                self.store.save(&Credentials {
                    token,
                    user: response.user.clone(),
                })?;
                Ok(Registered::SignedIn(response.user))
            }
            None => Ok(Registered::LoginRequired),
        }
    }

    async fn login(&self, email: &str, password: &str) -> Result<Option<UserInfo>, AuthError> {
        let dto = LoginDto {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let response = match self.post_auth("login", &dto).await {
            Err(AuthError::Gateway(GatewayError::Unauthenticated)) => {
                return Err(AuthError::InvalidCredentials);
            }
            other => other?,
        };
        let token = response.token.ok_or(AuthError::MissingToken)?;
        self.store.save(&Credentials {
            token,
            user: response.user.clone(),
        })?;
        tracing::info!(email = %dto.email, "logged in");
        Ok(response.user)
    }

    fn logout(&self) -> Result<(), AuthError> {
        self.store.clear()?;
        tracing::info!("logged out");
        Ok(())
    }

    fn is_authenticated(&self) -> bool {
        match self.store.load() {
            Ok(credentials) => credentials.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read credentials");
                false
            }
        }
    }
}
