//! Content-type handler registry

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::handler::ContentTypeHandler;

/// Maps a content-type key to its handler
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ContentTypeHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own content type, returning any handler it replaced
    pub fn register(
        &mut self,
        handler: Arc<dyn ContentTypeHandler>,
    ) -> Option<Arc<dyn ContentTypeHandler>> {
        let key = handler.content_type().to_string();
        debug!(content_type = %key, "Registering attachment handler");
        self.handlers.insert(key, handler)
    }

    pub fn with_handler(mut self, handler: Arc<dyn ContentTypeHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn handler_for(&self, content_type: &str) -> Option<Arc<dyn ContentTypeHandler>> {
        if content_type.is_empty() {
            return None;
        }
        self.handlers.get(content_type).cloned()
    }

    pub fn contains(&self, content_type: &str) -> bool {
        self.handlers.contains_key(content_type)
    }

    /// Registered content types, sorted
    pub fn content_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("content_types", &self.content_types())
            .finish()
    }
}
