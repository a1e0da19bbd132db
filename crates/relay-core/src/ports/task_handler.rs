//! TaskHandler port - タスクのエントリポイントを実行するランタイム
//!
//! エンジンはハンドラの中身を知りません。`dispatch` の完了を 1 回待つだけです。
//!
//! - `Ok(())` でも TaskContext にエラーが記録されていればタスクは Failed
//! - `Err(DispatchError)` はハードエラーで、残りのタスクは実行されない

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::app::TaskContext;
use crate::domain::{DispatchError, ExecutionDescriptor, HandlerKind};

#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn dispatch(&self, entry_point: &Path, ctx: &TaskContext) -> Result<(), DispatchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("handler for kind '{0}' is already registered")]
    AlreadyRegistered(HandlerKind),
}

/// Registry of handlers (kind -> handler).
///
/// Design:
/// - Built during initialization (mutable).
/// - Used during runtime (immutable, shared via Arc).
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<HandlerKind, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        kind: HandlerKind,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<(), RegistryError> {
        if self.handlers.contains_key(&kind) {
            return Err(RegistryError::AlreadyRegistered(kind));
        }
        self.handlers.insert(kind, handler);
        Ok(())
    }

    pub fn get(&self, kind: HandlerKind) -> Option<&Arc<dyn TaskHandler>> {
        self.handlers.get(&kind)
    }

    pub fn registered_kinds(&self) -> Vec<HandlerKind> {
        self.handlers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run one task through the handler its descriptor selects.
    pub async fn dispatch(
        &self,
        descriptor: &ExecutionDescriptor,
        ctx: &TaskContext,
    ) -> Result<(), DispatchError> {
        let handler = self
            .get(descriptor.handler)
            .ok_or(DispatchError::HandlerNotFound(descriptor.handler))?;
        handler.dispatch(&descriptor.entry_point, ctx).await
    }
}
