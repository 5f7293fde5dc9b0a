use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use crate::currency::CurrencyRegistry;
use crate::ledger::{Account, LedgerError, LedgerStore};

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 64;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    #[validate(length(min = 3, max = 64, message = "username must be 3 to 64 characters"))]
    #[schema(example = "alice")]
    pub username: String,
    #[validate(length(min = 8, max = 128, message = "password must be at least 8 characters"))]
    #[schema(example = "correct-horse-battery")]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignupResponse {
    pub id: i64,
    #[schema(example = "alice")]
    pub username: String,
    /// Currencies a zero-balance wallet was opened for
    #[schema(example = json!(["JPY", "SGD"]))]
    pub currencies: Vec<String>,
    pub created_at: DateTime<Utc>,
}

pub struct SignupService {
    store: Arc<dyn LedgerStore>,
    currencies: Arc<CurrencyRegistry>,
}

impl SignupService {
    pub fn new(store: Arc<dyn LedgerStore>, currencies: Arc<CurrencyRegistry>) -> Self {
        Self { store, currencies }
    }

    /// Register a new account. A taken username is a [`LedgerError::Conflict`].
    pub async fn signup(&self, req: &SignupRequest) -> Result<SignupResponse, LedgerError> {
        let username = req.username.trim();
        if username.chars().any(char::is_whitespace) {
            return Err(LedgerError::validation("username must not contain whitespace"));
        }
        if !(USERNAME_MIN..=USERNAME_MAX).contains(&username.chars().count()) {
            return Err(LedgerError::validation("username must be 3 to 64 characters"));
        }

        let password_hash = hash_password(&req.password)?;
        let currencies: Vec<String> = self.currencies.codes().map(str::to_string).collect();

        let Account {
            id,
            username,
            created_at,
        } = self
            .store
            .create_account(username, &password_hash, &currencies)
            .await?;

        info!(user_id = id, username = %username, "Account created");
        Ok(SignupResponse {
            id,
            username,
            currencies,
            created_at,
        })
    }
}

pub fn hash_password(password: &str) -> Result<String, LedgerError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| LedgerError::Fatal(format!("hashing failed: {e}")))
}
