//! Source registry (C2): a process-wide `kind -> factory` mapping producing
//! live backend connections, opaque to the core beyond their `name`/`kind`
//! and whatever capability accessor their concrete type exposes.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::Context;
use crate::error::{Error, Result};

/// A long-lived connection handle to a backend, keyed by a unique name.
///
/// Source instances are opaque to the core; tools recover backend-specific
/// capabilities by downcasting via [`Source::as_any`] against the concrete
/// type their adapter family expects (the "compatible-source capability
/// interface" in the tool registry spec).
pub trait Source: Send + Sync {
    /// The source's configured name, unique within a document.
    fn name(&self) -> &str;
    /// The source's `kind` tag, used for compatibility checks.
    fn kind(&self) -> &str;
    /// Downcast support for capability-accessor recovery by tool factories.
    fn as_any(&self) -> &dyn Any;
}

/// Produces a live [`Source`] from one `kind`-tagged config block.
///
/// Factories are installed once at startup via [`SourceRegistry::register`];
/// registering a duplicate kind is a fatal configuration error. A factory
/// must fully consume its config block so that unknown keys surface as
/// strict-decode errors rather than being silently ignored.
#[async_trait]
pub trait SourceFactory: Send + Sync {
    /// The `kind` string this factory handles.
    fn kind(&self) -> &'static str;

    /// Decode `raw` and dial the backend, producing a shared [`Source`].
    async fn build(&self, ctx: &Context, name: &str, raw: Value) -> Result<Arc<dyn Source>>;
}

/// Process-wide `kind -> factory` mapping for sources.
///
/// Write-once shared state: factories are registered in a batch at startup,
/// before config parsing begins, and never mutated afterward (per the
/// "process-wide registry" design note).
#[derive(Default)]
pub struct SourceRegistry {
    factories: HashMap<&'static str, Arc<dyn SourceFactory>>,
}

impl SourceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for a `kind`. Returns a [`Error::ConfigInvalid`]
    /// if that `kind` is already registered.
    pub fn register(&mut self, factory: Arc<dyn SourceFactory>) -> Result<()> {
        let kind = factory.kind();
        if self.factories.insert(kind, factory).is_some() {
            return Err(Error::ConfigInvalid(format!(
                "duplicate source kind registration: \"{kind}\""
            )));
        }
        Ok(())
    }

    /// Look up the factory for a `kind`, if one is registered.
    #[must_use]
    pub fn factory(&self, kind: &str) -> Option<Arc<dyn SourceFactory>> {
        self.factories.get(kind).cloned()
    }

    /// Build every configured source, keyed by name.
    pub async fn build_all(
        &self,
        ctx: &Context,
        entries: Vec<(String, String, Value)>,
    ) -> Result<SourceMap> {
        let mut sources = HashMap::new();
        for (name, kind, raw) in entries {
            let factory = self
                .factory(&kind)
                .ok_or_else(|| Error::ConfigInvalid(format!("unknown source kind \"{kind}\"")))?;
            let source = factory.build(ctx, &name, raw).await?;
            sources.insert(name, source);
        }
        Ok(SourceMap(sources))
    }
}

/// Materialised, immutable map of source name to live source, produced by
/// the config loader and shared by every tool bound to one of its entries.
#[derive(Clone, Default)]
pub struct SourceMap(HashMap<String, Arc<dyn Source>>);

impl SourceMap {
    /// Look up a source by its configured name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Source>> {
        self.0.get(name).cloned()
    }

    /// Number of materialised sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no sources were configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Arc<dyn Source>)> for SourceMap {
    fn from_iter<T: IntoIterator<Item = (String, Arc<dyn Source>)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
