//! Unit-of-work boundary used by the transactional middleware.
//!
//! The contract is begin/commit/rollback ordering only; the backing
//! persistence layer is a collaborator behind these traits. The crate
//! ships an in-memory no-op implementation since transaction state lives
//! in process memory.

use async_trait::async_trait;

#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn begin(&self) -> anyhow::Result<Box<dyn UowScope>>;
}

/// One open unit of work. Consumed by either commit or rollback.
#[async_trait]
pub trait UowScope: Send {
    async fn commit(self: Box<Self>) -> anyhow::Result<()>;
    async fn rollback(self: Box<Self>) -> anyhow::Result<()>;
}

/// No-op unit of work for the in-memory store.
pub struct InMemoryUnitOfWork;

struct InMemoryScope;

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn begin(&self) -> anyhow::Result<Box<dyn UowScope>> {
        Ok(Box::new(InMemoryScope))
    }
}

#[async_trait]
impl UowScope for InMemoryScope {
    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        Ok(())
    }
}
