//! Named request transformations registered ahead of time.
//!
//! Callers extend the request builder by registering operations here and
//! invoking them by name through `RequestModel::apply`. Lookups that miss
//! fail with `UnknownOperation` instead of being silently ignored.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{CallerError, Result};
use crate::http::request::RequestModel;

/// A registered transformation.
pub type Operation = Arc<dyn Fn(RequestModel, &[Value]) -> Result<RequestModel> + Send + Sync>;

#[derive(Clone, Default)]
pub struct OperationRegistry {
    operations: HashMap<String, Operation>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `op` under `name`, replacing an earlier registration.
    pub fn register<F>(&mut self, name: impl Into<String>, op: F)
    where
        F: Fn(RequestModel, &[Value]) -> Result<RequestModel> + Send + Sync + 'static,
    {
        self.operations.insert(name.into(), Arc::new(op));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn apply(&self, name: &str, request: RequestModel, args: &[Value]) -> Result<RequestModel> {
        let op = self
            .operations
            .get(name)
            .ok_or_else(|| CallerError::UnknownOperation(name.to_string()))?;
        op(request, args)
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("operations", &self.names())
            .finish()
    }
}
