//! Command/query dispatch pipeline.
//!
//! Each command or query type maps to exactly one handler through a
//! `TypeId` registry built once at startup and immutable afterwards.
//! Middleware wrap the resolved handler as a single deferred continuation:
//! registration order on the way in, reverse order on the way out.

pub mod middleware;
pub mod unit_of_work;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::store::StoreError;
use middleware::DispatchMiddleware;

/// Command trait. Commands are write operations with exactly one handler.
pub trait Command: Send + Sync + 'static {
    type Output: Send + 'static;
}

/// Query trait. Queries are read operations with exactly one handler.
pub trait Query: Send + Sync + 'static {
    type Output: Send + 'static;
}

#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    async fn handle(
        &self,
        command: &C,
        ctx: &DispatchContext<'_>,
    ) -> Result<C::Output, DispatchError>;
}

#[async_trait]
pub trait QueryHandler<Q: Query>: Send + Sync {
    async fn handle(&self, query: &Q, ctx: &DispatchContext<'_>)
        -> Result<Q::Output, DispatchError>;
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no handler registered for {0}")]
    HandlerNotFound(&'static str),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("payload type mismatch for {0}")]
    PayloadTypeMismatch(&'static str),

    #[error("result type mismatch for {0}")]
    ResultTypeMismatch(&'static str),

    #[error("unit of work failed: {0}")]
    UnitOfWork(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("handler failed: {0}")]
    Handler(String),
}

/// Per-call record pairing the in-flight payload with its cancellation
/// signal. Owned by exactly one dispatch and discarded after completion.
pub struct DispatchContext<'a> {
    payload: &'a (dyn Any + Send + Sync),
    name: &'static str,
    cancel: &'a CancellationToken,
}

impl<'a> DispatchContext<'a> {
    pub fn payload(&self) -> &'a (dyn Any + Send + Sync) {
        self.payload
    }

    /// Type name of the command or query being dispatched.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn cancellation(&self) -> &CancellationToken {
        self.cancel
    }
}

pub type PipelineResult = Result<Box<dyn Any + Send>, DispatchError>;

/// Type-erased handler stored in the registry.
#[async_trait]
trait ErasedHandler: Send + Sync {
    async fn call(&self, ctx: &DispatchContext<'_>) -> PipelineResult;
}

/// Adapter from a typed command handler to the erased registry entry.
struct TypedCommandHandler<C, H> {
    handler: H,
    _marker: PhantomData<fn() -> C>,
}

#[async_trait]
impl<C, H> ErasedHandler for TypedCommandHandler<C, H>
where
    C: Command,
    H: CommandHandler<C>,
{
    async fn call(&self, ctx: &DispatchContext<'_>) -> PipelineResult {
        let command = ctx
            .payload()
            .downcast_ref::<C>()
            .ok_or(DispatchError::PayloadTypeMismatch(std::any::type_name::<C>()))?;
        let output = self.handler.handle(command, ctx).await?;
        Ok(Box::new(output))
    }
}

struct TypedQueryHandler<Q, H> {
    handler: H,
    _marker: PhantomData<fn() -> Q>,
}

#[async_trait]
impl<Q, H> ErasedHandler for TypedQueryHandler<Q, H>
where
    Q: Query,
    H: QueryHandler<Q>,
{
    async fn call(&self, ctx: &DispatchContext<'_>) -> PipelineResult {
        let query = ctx
            .payload()
            .downcast_ref::<Q>()
            .ok_or(DispatchError::PayloadTypeMismatch(std::any::type_name::<Q>()))?;
        let output = self.handler.handle(query, ctx).await?;
        Ok(Box::new(output))
    }
}

/// Builder for the dispatch registry. Consumed by `build`; the resulting
/// `Dispatcher` cannot be mutated.
pub struct DispatcherBuilder {
    commands: HashMap<TypeId, Arc<dyn ErasedHandler>>,
    queries: HashMap<TypeId, Arc<dyn ErasedHandler>>,
    middlewares: Vec<Arc<dyn DispatchMiddleware>>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
            queries: HashMap::new(),
            middlewares: Vec::new(),
        }
    }

    pub fn command<C, H>(mut self, handler: H) -> Self
    where
        C: Command,
        H: CommandHandler<C> + 'static,
    {
        self.commands.insert(
            TypeId::of::<C>(),
            Arc::new(TypedCommandHandler {
                handler,
                _marker: PhantomData,
            }),
        );
        self
    }

    pub fn query<Q, H>(mut self, handler: H) -> Self
    where
        Q: Query,
        H: QueryHandler<Q> + 'static,
    {
        self.queries.insert(
            TypeId::of::<Q>(),
            Arc::new(TypedQueryHandler {
                handler,
                _marker: PhantomData,
            }),
        );
        self
    }

    /// Append a middleware. Order of calls is the order commands flow in.
    pub fn middleware<M: DispatchMiddleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            commands: self.commands,
            queries: self.queries,
            middlewares: self.middlewares,
        }
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable dispatch registry plus ordered middleware chain.
pub struct Dispatcher {
    commands: HashMap<TypeId, Arc<dyn ErasedHandler>>,
    queries: HashMap<TypeId, Arc<dyn ErasedHandler>>,
    middlewares: Vec<Arc<dyn DispatchMiddleware>>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub async fn dispatch_command<C: Command>(
        &self,
        command: C,
        cancel: CancellationToken,
    ) -> Result<C::Output, DispatchError> {
        let handler = self
            .commands
            .get(&TypeId::of::<C>())
            .ok_or(DispatchError::HandlerNotFound(std::any::type_name::<C>()))?;
        self.run::<C::Output>(&command, std::any::type_name::<C>(), handler.as_ref(), &cancel)
            .await
    }

    pub async fn dispatch_query<Q: Query>(
        &self,
        query: Q,
        cancel: CancellationToken,
    ) -> Result<Q::Output, DispatchError> {
        let handler = self
            .queries
            .get(&TypeId::of::<Q>())
            .ok_or(DispatchError::HandlerNotFound(std::any::type_name::<Q>()))?;
        self.run::<Q::Output>(&query, std::any::type_name::<Q>(), handler.as_ref(), &cancel)
            .await
    }

    async fn run<O: Send + 'static>(
        &self,
        payload: &(dyn Any + Send + Sync),
        name: &'static str,
        handler: &dyn ErasedHandler,
        cancel: &CancellationToken,
    ) -> Result<O, DispatchError> {
        let ctx = DispatchContext {
            payload,
            name,
            cancel,
        };
        let result = execute_from(&self.middlewares, 0, &ctx, handler).await?;
        result
            .downcast::<O>()
            .map(|boxed| *boxed)
            .map_err(|_| DispatchError::ResultTypeMismatch(name))
    }
}

/// Recursively folds the middleware list around the handler call so each
/// middleware sees the rest of the pipeline as one continuation.
fn execute_from<'a>(
    middlewares: &'a [Arc<dyn DispatchMiddleware>],
    index: usize,
    ctx: &'a DispatchContext<'a>,
    handler: &'a dyn ErasedHandler,
) -> Pin<Box<dyn Future<Output = PipelineResult> + Send + 'a>> {
    match middlewares.get(index) {
        None => handler.call(ctx),
        Some(mw) => Box::pin(async move {
            mw.handle(
                ctx,
                Box::new(move || execute_from(middlewares, index + 1, ctx, handler)),
            )
            .await
        }),
    }
}
