use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;

use crate::compactor;
use crate::engine::Engine;
use crate::limits::*;

/// Per-database engines. Each tenant gets its own Engine, WAL file and
/// compactor task; the tenant is the database name from the connection.
pub struct TenantManager {
    engines: DashMap<String, Arc<Engine>>,
    /// Tenants loaded or being loaded. Slots are reserved before replay.
    loaded: AtomicUsize,
    max_tenants: usize,
    data_dir: PathBuf,
    compact_threshold: u64,
}

/// Keep only characters that are safe in a file name.
pub(crate) fn sanitize(tenant: &str) -> io::Result<String> {
    if tenant.len() > MAX_TENANT_NAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "tenant name too long",
        ));
    }
    let safe: String = tenant
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if safe.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "empty tenant name",
        ));
    }
    Ok(safe)
}

impl TenantManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64) -> Self {
        Self::with_limit(data_dir, compact_threshold, MAX_TENANTS)
    }

    pub fn with_limit(data_dir: PathBuf, compact_threshold: u64, max_tenants: usize) -> Self {
        Self {
            engines: DashMap::new(),
            loaded: AtomicUsize::new(0),
            max_tenants,
            data_dir,
            compact_threshold,
        }
    }

    /// Get or lazily create the engine for `tenant`. Names that sanitize to
    /// the same file name share one engine.
    ///
    /// The WAL replay runs without any map lock held. Two callers racing on
    /// a new tenant may both replay; the first insert wins and the other
    /// engine is dropped before it ever writes.
    pub fn get_or_create(&self, tenant: &str) -> io::Result<Arc<Engine>> {
        let name = sanitize(tenant)?;
        if let Some(engine) = self.engines.get(&name) {
            return Ok(engine.value().clone());
        }

        self.loaded
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max_tenants).then_some(n + 1)
            })
            .map_err(|_| io::Error::other("too many tenants"))?;

        let wal_path = self.data_dir.join(format!("{name}.wal"));
        let engine = match Engine::new(wal_path) {
            Ok(engine) => Arc::new(engine),
            Err(e) => {
                self.loaded.fetch_sub(1, Ordering::SeqCst);
                return Err(e);
            }
        };

        match self.engines.entry(name.clone()) {
            Entry::Occupied(existing) => {
                self.loaded.fetch_sub(1, Ordering::SeqCst);
                Ok(existing.get().clone())
            }
            Entry::Vacant(slot) => {
                slot.insert(engine.clone());
                tokio::spawn(compactor::run_compactor(
                    engine.clone(),
                    self.compact_threshold,
                ));
                info!("tenant {name} loaded");
                metrics::gauge!(crate::observability::TENANTS_ACTIVE)
                    .set(self.loaded.load(Ordering::SeqCst) as f64);
                Ok(engine)
            }
        }
    }
}
