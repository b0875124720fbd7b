use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::compactor;
use crate::directory::MemoryDirectory;
use crate::engine::Engine;
use crate::limits::*;

/// One agency: its engine plus the directory mirror it reads brokers from.
#[derive(Clone)]
pub struct Tenant {
    pub engine: Arc<Engine>,
    pub directory: Arc<MemoryDirectory>,
}

/// Manages per-tenant engines. Each tenant gets its own Engine + WAL +
/// directory snapshot + compactor. Tenant = database name from the pgwire
/// connection.
pub struct TenantManager {
    tenants: DashMap<String, Tenant>,
    data_dir: PathBuf,
    compact_threshold: u64,
}

impl TenantManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64) -> Self {
        Self {
            tenants: DashMap::new(),
            data_dir,
            compact_threshold,
        }
    }

    /// Get or lazily open a tenant.
    pub fn get_or_create(&self, tenant: &str) -> std::io::Result<Tenant> {
        if let Some(t) = self.tenants.get(tenant) {
            return Ok(t.value().clone());
        }
        if tenant.len() > MAX_TENANT_NAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "tenant name too long",
            ));
        }
        if self.tenants.len() >= MAX_TENANTS {
            return Err(std::io::Error::other("too many tenants"));
        }

        // Sanitize tenant name to prevent path traversal
        let safe_name: String = tenant
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if safe_name.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty tenant name",
            ));
        }

        // Two connections may race to open the same tenant; the entry lock
        // makes exactly one of them build it.
        let entry = self.tenants.entry(tenant.to_string()).or_try_insert_with(|| {
            let directory = Arc::new(MemoryDirectory::open(
                &self.data_dir.join(format!("{safe_name}.directory.json")),
            )?);
            let engine = Arc::new(Engine::new(
                self.data_dir.join(format!("{safe_name}.wal")),
                directory.clone(),
            )?);

            let compactor_engine = engine.clone();
            let threshold = self.compact_threshold;
            tokio::spawn(async move {
                compactor::run_compactor(compactor_engine, threshold).await;
            });
            info!("opened tenant {safe_name}");
            Ok::<_, std::io::Error>(Tenant { engine, directory })
        })?;
        let tenant = entry.value().clone();
        drop(entry);

        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.tenants.len() as f64);
        Ok(tenant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{BrokerProfile, Directory};
    use crate::engine::NewBlockedPeriod;
    use crate::model::*;
    use std::fs;
    use ulid::Ulid;

    fn test_data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("brokerslot_test_tenant").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn tenant_isolation() {
        let dir = test_data_dir("isolation");
        let tm = TenantManager::new(dir, 1000);

        let a = tm.get_or_create("agency_a").unwrap();
        let b = tm.get_or_create("agency_b").unwrap();

        // Same broker id registered in both tenants.
        let broker = Ulid::new();
        a.directory.upsert_broker(BrokerProfile::new(broker, None)).unwrap();
        b.directory.upsert_broker(BrokerProfile::new(broker, None)).unwrap();

        // 2035-01-01T09:00:00Z
        let start: Ms = 2_051_222_400_000 + 9 * HOUR_MS;
        a.engine
            .create_blocked_period(NewBlockedPeriod {
                broker_id: broker,
                start,
                end: start + HOUR_MS,
                reason: None,
                block_type: BlockType::Personal,
                recurrence: None,
                created_by: None,
            })
            .await
            .unwrap();

        assert_eq!(a.engine.list_blocked_periods(broker, None).await.unwrap().len(), 1);
        assert!(b.engine.list_blocked_periods(broker, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tenant_lazy_creation() {
        let dir = test_data_dir("lazy");
        let tm = TenantManager::new(dir.clone(), 1000);

        let entries: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        assert!(entries.is_empty());

        let t = tm.get_or_create("my_db").unwrap();
        assert!(dir.join("my_db.wal").exists());

        // The directory snapshot appears on first write.
        t.directory.upsert_broker(BrokerProfile::new(Ulid::new(), None)).unwrap();
        assert!(dir.join("my_db.directory.json").exists());
    }

    #[tokio::test]
    async fn tenant_directory_survives_reopen() {
        let dir = test_data_dir("reopen");
        let broker = Ulid::new();
        {
            let tm = TenantManager::new(dir.clone(), 1000);
            let t = tm.get_or_create("agency").unwrap();
            t.directory.upsert_broker(BrokerProfile::new(broker, Some("Nour".into()))).unwrap();
        }
        let tm = TenantManager::new(dir, 1000);
        let t = tm.get_or_create("agency").unwrap();
        let profile = t.engine.directory().get_broker(broker).await.unwrap();
        assert_eq!(profile.name.as_deref(), Some("Nour"));
    }

    #[tokio::test]
    async fn tenant_same_engine_returned() {
        let dir = test_data_dir("same_eng");
        let tm = TenantManager::new(dir, 1000);

        let t1 = tm.get_or_create("foo").unwrap();
        let t2 = tm.get_or_create("foo").unwrap();
        assert!(Arc::ptr_eq(&t1.engine, &t2.engine));
        assert!(Arc::ptr_eq(&t1.directory, &t2.directory));
    }

    #[tokio::test]
    async fn tenant_name_sanitized() {
        let dir = test_data_dir("sanitize");
        let tm = TenantManager::new(dir.clone(), 1000);

        let _t = tm.get_or_create("../evil").unwrap();
        assert!(dir.join("evil.wal").exists());

        assert!(tm.get_or_create("../..").is_err());
    }

    #[tokio::test]
    async fn tenant_name_too_long() {
        let dir = test_data_dir("name_too_long");
        let tm = TenantManager::new(dir, 1000);

        let long_name = "x".repeat(MAX_TENANT_NAME_LEN + 1);
        let err = tm.get_or_create(&long_name).err().unwrap();
        assert!(err.to_string().contains("tenant name too long"));
    }
}
