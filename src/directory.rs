//! Read-side view of the broker and property-assignment data owned by the
//! admin system. The engine only consumes it through [`Directory`].

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono_tz::Tz;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::EngineError;
use crate::limits::*;
use crate::time::parse_timezone;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerProfile {
    pub id: Ulid,
    pub name: Option<String>,
    /// IANA name, e.g. `Africa/Cairo`.
    pub timezone: String,
    pub is_active: bool,
}

impl BrokerProfile {
    pub fn new(id: Ulid, name: Option<String>) -> Self {
        Self {
            id,
            name,
            timezone: DEFAULT_TIMEZONE.to_string(),
            is_active: true,
        }
    }

    pub fn tz(&self) -> Result<Tz, EngineError> {
        parse_timezone(&self.timezone)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub property_id: Ulid,
    pub broker_id: Ulid,
    pub is_primary: bool,
    pub is_active: bool,
}

#[async_trait]
pub trait Directory: Send + Sync {
    async fn get_broker(&self, broker_id: Ulid) -> Result<BrokerProfile, EngineError>;

    /// Active assignments for a property, primary broker first.
    async fn list_active_brokers(&self, property_id: Ulid) -> Result<Vec<Assignment>, EngineError>;

    /// Every active property a broker is assigned to.
    async fn list_broker_properties(&self, broker_id: Ulid) -> Result<Vec<Assignment>, EngineError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    brokers: Vec<BrokerProfile>,
    assignments: Vec<Assignment>,
}

/// Local mirror of the directory, optionally persisted as a JSON snapshot.
pub struct MemoryDirectory {
    brokers: DashMap<Ulid, BrokerProfile>,
    /// property id → assignments
    assignments: DashMap<Ulid, Vec<Assignment>>,
    snapshot_path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self {
            brokers: DashMap::new(),
            assignments: DashMap::new(),
            snapshot_path: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Open (or start) a snapshot-backed directory at `path`.
    pub fn open(path: &Path) -> io::Result<Self> {
        let dir = Self {
            snapshot_path: Some(path.to_path_buf()),
            ..Self::new()
        };
        let snapshot: Snapshot = match File::open(path) {
            Ok(f) => serde_json::from_reader(BufReader::new(f))
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Snapshot::default(),
            Err(e) => return Err(e),
        };
        for b in snapshot.brokers {
            dir.brokers.insert(b.id, b);
        }
        for a in snapshot.assignments {
            dir.assignments.entry(a.property_id).or_default().push(a);
        }
        Ok(dir)
    }

    pub fn upsert_broker(&self, profile: BrokerProfile) -> Result<(), EngineError> {
        profile.tz()?;
        if let Some(ref n) = profile.name
            && n.len() > MAX_BROKER_NAME_LEN
        {
            return Err(EngineError::LimitExceeded("broker name too long"));
        }
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| EngineError::Storage("directory lock poisoned".into()))?;

        let mut snapshot = self.snapshot();
        snapshot.brokers.retain(|b| b.id != profile.id);
        snapshot.brokers.push(profile.clone());
        self.persist(&snapshot)?;

        self.brokers.insert(profile.id, profile);
        Ok(())
    }

    /// Upsert an assignment keyed by `(property, broker)`. Marking one broker
    /// primary demotes any other primary on the same property.
    pub fn assign(&self, assignment: Assignment) -> Result<(), EngineError> {
        if !self.brokers.contains_key(&assignment.broker_id) {
            return Err(EngineError::NotFound(assignment.broker_id));
        }
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| EngineError::Storage("directory lock poisoned".into()))?;

        let mut current = self
            .assignments
            .get(&assignment.property_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        current.retain(|a| a.broker_id != assignment.broker_id);
        if assignment.is_primary {
            for a in current.iter_mut() {
                a.is_primary = false;
            }
        }
        current.push(assignment.clone());

        let mut snapshot = self.snapshot();
        snapshot
            .assignments
            .retain(|a| a.property_id != assignment.property_id);
        snapshot.assignments.extend(current.iter().cloned());
        self.persist(&snapshot)?;

        self.assignments.insert(assignment.property_id, current);
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        let mut brokers: Vec<BrokerProfile> =
            self.brokers.iter().map(|e| e.value().clone()).collect();
        brokers.sort_by_key(|b| b.id);
        let mut assignments: Vec<Assignment> = self
            .assignments
            .iter()
            .flat_map(|e| e.value().clone())
            .collect();
        assignments.sort_by_key(|a| (a.property_id, a.broker_id));
        Snapshot { brokers, assignments }
    }

    /// Write to a temp file, fsync, then rename over the snapshot.
    fn persist(&self, snapshot: &Snapshot) -> Result<(), EngineError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let write = || -> io::Result<()> {
            let tmp_path = path.with_extension("json.tmp");
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            serde_json::to_writer_pretty(&mut writer, snapshot)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            fs::rename(&tmp_path, path)
        };
        write().map_err(|e| EngineError::Storage(format!("directory snapshot: {e}")))
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn get_broker(&self, broker_id: Ulid) -> Result<BrokerProfile, EngineError> {
        self.brokers
            .get(&broker_id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(broker_id))
    }

    async fn list_active_brokers(&self, property_id: Ulid) -> Result<Vec<Assignment>, EngineError> {
        let mut active: Vec<Assignment> = self
            .assignments
            .get(&property_id)
            .map(|e| e.value().iter().filter(|a| a.is_active).cloned().collect())
            .unwrap_or_default();
        active.sort_by_key(|a| !a.is_primary);
        Ok(active)
    }

    async fn list_broker_properties(&self, broker_id: Ulid) -> Result<Vec<Assignment>, EngineError> {
        let mut props: Vec<Assignment> = self
            .assignments
            .iter()
            .flat_map(|e| {
                e.value()
                    .iter()
                    .filter(|a| a.broker_id == broker_id && a.is_active)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        props.sort_by_key(|a| a.property_id);
        Ok(props)
    }
}
