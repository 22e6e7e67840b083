//! Cross-cutting middleware for the dispatch pipeline.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use super::unit_of_work::UnitOfWork;
use super::{DispatchContext, DispatchError, PipelineResult};

/// The rest of the pipeline as a single deferred continuation. A
/// middleware may invoke it zero or one times.
pub type Next<'a> =
    Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = PipelineResult> + Send + 'a>> + Send + 'a>;

#[async_trait]
pub trait DispatchMiddleware: Send + Sync {
    async fn handle(&self, ctx: &DispatchContext<'_>, next: Next<'_>) -> PipelineResult;
}

/// Logs pipeline start/end around the continuation. Never alters the
/// result and never suppresses an error.
pub struct LoggingMiddleware;

#[async_trait]
impl DispatchMiddleware for LoggingMiddleware {
    async fn handle(&self, ctx: &DispatchContext<'_>, next: Next<'_>) -> PipelineResult {
        tracing::info!(pipeline = ctx.name(), "dispatch pipeline started");
        let result = next().await;
        match &result {
            Ok(_) => tracing::info!(pipeline = ctx.name(), "dispatch pipeline finished"),
            Err(err) => {
                tracing::warn!(pipeline = ctx.name(), error = %err, "dispatch pipeline failed")
            }
        }
        result
    }
}

type ValidatorFn = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Result<(), Vec<String>> + Send + Sync>;

/// Runs the validator registered for the payload's concrete type, if any,
/// before the continuation. On violation the continuation is never
/// invoked and the joined messages are returned as a validation error.
pub struct ValidationMiddleware {
    validators: HashMap<TypeId, ValidatorFn>,
}

impl ValidationMiddleware {
    pub fn new() -> Self {
        Self {
            validators: HashMap::new(),
        }
    }

    pub fn validator<T, F>(mut self, rule: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> Result<(), Vec<String>> + Send + Sync + 'static,
    {
        self.validators.insert(
            TypeId::of::<T>(),
            Arc::new(move |payload| match payload.downcast_ref::<T>() {
                Some(value) => rule(value),
                // registry is keyed by TypeId, a mismatch cannot happen
                None => Ok(()),
            }),
        );
        self
    }
}

impl Default for ValidationMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DispatchMiddleware for ValidationMiddleware {
    async fn handle(&self, ctx: &DispatchContext<'_>, next: Next<'_>) -> PipelineResult {
        if let Some(validator) = self.validators.get(&ctx.payload().type_id()) {
            if let Err(violations) = validator(ctx.payload()) {
                return Err(DispatchError::Validation(violations.join(", ")));
            }
        }
        next().await
    }
}

/// Opens a unit of work before the continuation; commits on success,
/// rolls back on any error and re-raises the original error unchanged.
pub struct TransactionalMiddleware {
    uow: Arc<dyn UnitOfWork>,
}

impl TransactionalMiddleware {
    pub fn new(uow: Arc<dyn UnitOfWork>) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl DispatchMiddleware for TransactionalMiddleware {
    async fn handle(&self, ctx: &DispatchContext<'_>, next: Next<'_>) -> PipelineResult {
        let scope = self
            .uow
            .begin()
            .await
            .map_err(|e| DispatchError::UnitOfWork(e.to_string()))?;

        match next().await {
            Ok(result) => {
                scope
                    .commit()
                    .await
                    .map_err(|e| DispatchError::UnitOfWork(e.to_string()))?;
                Ok(result)
            }
            Err(err) => {
                if let Err(rollback_err) = scope.rollback().await {
                    tracing::error!(
                        pipeline = ctx.name(),
                        error = %rollback_err,
                        "rollback failed after pipeline error"
                    );
                }
                Err(err)
            }
        }
    }
}
