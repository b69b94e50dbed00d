//! Stage and run configuration.
//!
//! A [`StageConfig`] is built once at process start from the environment and
//! passed explicitly to every client call; there are no global credential
//! tables. Validation is eager: the CLI calls [`StageConfig::validate`] before
//! any work starts, so a missing token for the requested stage fails the run
//! up front instead of mid-batch.

use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::contract::ApiError;

/// A named deployment target: the Zenodo sandbox or the production site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Sandbox,
    Production,
}

impl Stage {
    pub fn host(&self) -> &'static str {
        match self {
            Stage::Sandbox => "https://sandbox.zenodo.org",
            Stage::Production => "https://zenodo.org",
        }
    }

    /// Environment variable holding the access token for this stage.
    pub fn token_env(&self) -> &'static str {
        match self {
            Stage::Sandbox => "ZENODO_TOKEN_SANDBOX",
            Stage::Production => "ZENODO_TOKEN_PROD",
        }
    }

    /// DOI prefix assigned by the stage on publish.
    pub fn doi_prefix(&self) -> &'static str {
        match self {
            Stage::Sandbox => "10.5072",
            Stage::Production => "10.5281",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Sandbox => "sandbox",
            Stage::Production => "production",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sandbox" | "dev" => Ok(Stage::Sandbox),
            "production" | "prod" => Ok(Stage::Production),
            other => Err(format!(
                "unknown stage '{other}', expected 'sandbox' or 'production'"
            )),
        }
    }
}

/// Resolved configuration for one stage: host, credential, DOI prefix.
///
/// The token stays an `Option` so the client guard can report a missing
/// credential as a typed error on every call; [`validate`](Self::validate)
/// gives callers the eager-failure variant of the same check.
#[derive(Debug, Clone)]
pub struct StageConfig {
    pub stage: Stage,
    pub host: String,
    pub token: Option<String>,
}

impl StageConfig {
    /// Read the stage's token from its environment variable. An unset or
    /// empty variable leaves the token `None`; it does not error here.
    pub fn from_env(stage: Stage) -> Self {
        let token = env::var(stage.token_env()).ok().filter(|t| !t.is_empty());
        debug!(
            stage = %stage,
            token_set = token.is_some(),
            "Resolved stage configuration from environment"
        );
        StageConfig {
            stage,
            host: stage.host().to_owned(),
            token,
        }
    }

    /// Construct with an explicit token, bypassing the environment.
    pub fn with_token(stage: Stage, token: impl Into<String>) -> Self {
        StageConfig {
            stage,
            host: stage.host().to_owned(),
            token: Some(token.into()),
        }
    }

    /// Fail fast if the credential for this stage is absent.
    pub fn validate(&self) -> Result<(), ApiError> {
        match &self.token {
            Some(_) => {
                info!(stage = %self.stage, host = %self.host, "Stage configuration validated");
                Ok(())
            }
            None => Err(ApiError::MissingToken {
                stage: self.stage.to_string(),
                env_var: self.stage.token_env().to_owned(),
            }),
        }
    }
}

/// Options for one batch run, shared read-only by all workers.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Skip every mutating remote call, still exercising the decision logic.
    pub dry_run: bool,
    /// Requested worker count; `None` leaves one core free, negative N leaves
    /// N cores free.
    pub workers: Option<i32>,
}

/// Resolve the effective worker count from the request and the number of
/// available cores. Negative requests mean "leave that many cores free";
/// the result is always at least 1.
pub fn resolve_workers(requested: Option<i32>, available: usize) -> usize {
    let available = available.max(1);
    match requested {
        None => (available - 1).max(1),
        Some(n) if n > 0 => n as usize,
        Some(n) => {
            let free = n.unsigned_abs() as usize;
            available.saturating_sub(free).max(1)
        }
    }
}
