//! One audit logger per environment, created on first use.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::error::AuditError;
use super::logger::{AuditLogger, AuditSettings};
use crate::models::Environment;

/// Environment-keyed logger registry owned by the composition root.
///
/// Each environment gets its own logger and therefore its own files; trails
/// never mix between environments.
#[derive(Debug)]
pub struct AuditRegistry {
    dir: PathBuf,
    settings: AuditSettings,
    loggers: Mutex<HashMap<Environment, Arc<AuditLogger>>>,
}

impl AuditRegistry {
    /// Registry writing under `dir`.
    pub fn new(dir: impl Into<PathBuf>, settings: AuditSettings) -> Self {
        Self {
            dir: dir.into(),
            settings,
            loggers: Mutex::new(HashMap::new()),
        }
    }

    /// Shared audit directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Logger for `env`, constructing it on first request.
    pub fn logger(&self, env: Environment) -> Result<Arc<AuditLogger>, AuditError> {
        let mut loggers = self.loggers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(logger) = loggers.get(&env) {
            return Ok(Arc::clone(logger));
        }

        let logger = Arc::new(AuditLogger::new(&self.dir, env, self.settings.clone())?);
        loggers.insert(env, Arc::clone(&logger));
        Ok(logger)
    }

    /// Environments with a live logger.
    #[must_use]
    pub fn environments(&self) -> Vec<Environment> {
        let loggers = self.loggers.lock().unwrap_or_else(PoisonError::into_inner);
        let mut envs: Vec<Environment> = loggers.keys().copied().collect();
        envs.sort_by_key(|env| env.slug());
        envs
    }
}
