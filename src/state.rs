//! Shared, immutable application state served by both dispatchers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use toolhost_core::{Tool, Toolset};

use crate::bootstrap::Runtime;
use crate::config::AuthServiceConfig;

/// Everything a request handler needs: the materialised tools/toolsets and
/// the auth-service verifier tables. Built once at startup, shared
/// read-only across every request task.
pub struct AppState {
    /// Tools, keyed by name.
    pub tools: HashMap<String, Arc<Tool>>,
    /// Toolsets, keyed by name.
    pub toolsets: HashMap<String, Arc<Toolset>>,
    /// Auth-service verifier tables, keyed by name.
    pub auth_services: HashMap<String, AuthServiceConfig>,
    request_counter: AtomicU64,
}

impl AppState {
    /// Assemble application state from a built [`Runtime`] and the
    /// document's `authServices` section.
    #[must_use]
    pub fn new(runtime: Runtime, auth_services: HashMap<String, AuthServiceConfig>) -> Self {
        Self {
            tools: runtime.tools,
            toolsets: runtime.toolsets,
            auth_services,
            request_counter: AtomicU64::new(1),
        }
    }

    /// A monotonically increasing, process-unique request id for log
    /// correlation, avoiding a UUID dependency this server otherwise has
    /// no other use for.
    pub fn next_request_id(&self) -> String {
        format!("req-{}", self.request_counter.fetch_add(1, Ordering::Relaxed))
    }
}
