mod blocked;
mod bookings;
pub mod capacity;
mod conflict;
mod dashboard;
mod error;
mod queries;
pub mod slots;
mod windows;

pub use blocked::{BlockedOutcome, InstanceFailure, NewBlockedPeriod};
pub use bookings::NewBooking;
pub use conflict::{earliest_allowed_start, find_conflicts, now_ms};
pub use dashboard::{DashboardSummary, DayAvailability, ProfileStats};
pub use error::EngineError;
pub use queries::BrokerSlots;

use std::collections::HashMap;
use std::io;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, OwnedRwLockWriteGuard, RwLock, RwLockReadGuard};
use tracing::info;
use ulid::Ulid;

use crate::directory::{BrokerProfile, Directory};
use crate::model::*;
use crate::wal::Wal;

pub type SharedSchedule = Arc<RwLock<BrokerSchedule>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                    .record(batch.len() as f64);
                let flush_start = std::time::Instant::now();
                let result = flush_batch(&mut wal, &batch);
                metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                    .record(flush_start.elapsed().as_secs_f64());
                respond_batch(batch, &result);

                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even after an append error so partial bytes don't leak into the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn respond_batch(batch: Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => {
            let result = wal.append_buffered(&event).and_then(|()| wal.flush_sync());
            let _ = response.send(result);
        }
    }
}

pub struct Engine {
    /// broker id → schedule
    pub state: DashMap<Ulid, SharedSchedule>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    /// Reverse lookup: window / blocked period / booking id → broker id
    pub(super) entity_to_broker: DashMap<Ulid, Ulid>,
    pub(super) directory: Arc<dyn Directory>,
    /// Writers hold this shared; compaction holds it exclusively so no
    /// append can land between the state snapshot and the file swap.
    pub(super) compaction_gate: RwLock<()>,
}

/// Write access to one broker's schedule. Holding it keeps compaction out.
pub(super) struct BrokerWrite<'a> {
    _gate: RwLockReadGuard<'a, ()>,
    schedule: OwnedRwLockWriteGuard<BrokerSchedule>,
}

impl Deref for BrokerWrite<'_> {
    type Target = BrokerSchedule;

    fn deref(&self) -> &BrokerSchedule {
        &self.schedule
    }
}

impl DerefMut for BrokerWrite<'_> {
    fn deref_mut(&mut self) -> &mut BrokerSchedule {
        &mut self.schedule
    }
}

/// Apply an event to a schedule the caller already holds locked.
///
/// Capacity changes go through `capacity::increment` / `capacity::decrement`
/// so `current_bookings` never leaves `0..=max_bookings`, even on replay.
fn apply_to_schedule(rs: &mut BrokerSchedule, event: &Event, entity_map: &DashMap<Ulid, Ulid>) {
    match event {
        Event::WindowsReplaced { date, windows, .. } => {
            for old in rs.windows_on(*date) {
                entity_map.remove(&old.id);
            }
            for w in windows {
                entity_map.insert(w.id, rs.broker_id);
            }
            rs.replace_windows(*date, windows.clone());
        }
        Event::WindowAvailabilitySet { id, is_available, .. } => {
            if let Some(w) = rs.window_mut(id) {
                w.is_available = *is_available;
            }
        }
        Event::BlockedPeriodCreated { period } => {
            entity_map.insert(period.id, period.broker_id);
            rs.insert_blocked(period.clone());
        }
        Event::BlockedPeriodDeleted { id, .. } => {
            rs.remove_blocked(*id);
            entity_map.remove(id);
        }
        Event::CapacityReserved { window_id, .. } => {
            if let Some(w) = rs.window_mut(window_id) {
                capacity::increment(w);
            }
        }
        Event::CapacityReleased { window_id, .. } => {
            if let Some(w) = rs.window_mut(window_id) {
                capacity::decrement(w);
            }
        }
        Event::BookingConfirmed { booking } => {
            if let Some(w) = rs.window_mut(&booking.window_id) {
                capacity::increment(w);
            }
            entity_map.insert(booking.id, booking.broker_id);
            rs.insert_booking(booking.clone());
        }
        Event::BookingRestored { booking } => {
            entity_map.insert(booking.id, booking.broker_id);
            rs.insert_booking(booking.clone());
        }
        Event::BookingCancelled { id, .. } => {
            if let Some(booking) = rs.remove_booking(*id)
                && let Some(w) = rs.window_mut(&booking.window_id)
            {
                capacity::decrement(w);
            }
            entity_map.remove(id);
        }
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, directory: Arc<dyn Directory>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let entity_to_broker = DashMap::new();

        // Replay into plain schedules first; nothing else can observe them yet.
        let mut schedules: HashMap<Ulid, BrokerSchedule> = HashMap::new();
        for event in &events {
            let broker_id = event.broker_id();
            let rs = schedules
                .entry(broker_id)
                .or_insert_with(|| BrokerSchedule::new(broker_id));
            apply_to_schedule(rs, event, &entity_to_broker);
        }

        let state = DashMap::new();
        for (id, rs) in schedules {
            state.insert(id, Arc::new(RwLock::new(rs)));
        }

        if !events.is_empty() {
            info!(
                "replayed {} events for {} brokers from {}",
                events.len(),
                state.len(),
                wal_path.display()
            );
        }

        Ok(Self {
            state,
            wal_tx,
            entity_to_broker,
            directory,
            compaction_gate: RwLock::new(()),
        })
    }

    pub fn directory(&self) -> &Arc<dyn Directory> {
        &self.directory
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Storage("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Storage("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Storage(e.to_string()))
    }

    pub fn get_schedule(&self, broker_id: &Ulid) -> Option<SharedSchedule> {
        self.state.get(broker_id).map(|e| e.value().clone())
    }

    pub fn get_broker_for_entity(&self, entity_id: &Ulid) -> Option<Ulid> {
        self.entity_to_broker.get(entity_id).map(|e| *e.value())
    }

    /// The broker's profile from the directory; `NotFound` if unknown.
    pub(super) async fn broker_profile(&self, broker_id: Ulid) -> Result<BrokerProfile, EngineError> {
        self.directory.get_broker(broker_id).await
    }

    /// Lock a broker's schedule for writing, creating an empty one on first use.
    pub(super) async fn lock_broker(&self, broker_id: Ulid) -> BrokerWrite<'_> {
        let gate = self.compaction_gate.read().await;
        let rs = self
            .state
            .entry(broker_id)
            .or_insert_with(|| Arc::new(RwLock::new(BrokerSchedule::new(broker_id))))
            .clone();
        BrokerWrite {
            _gate: gate,
            schedule: rs.write_owned().await,
        }
    }

    /// Lookup entity → broker, acquire that broker's write lock.
    pub(super) async fn resolve_entity_write(
        &self,
        entity_id: &Ulid,
    ) -> Result<(Ulid, BrokerWrite<'_>), EngineError> {
        let broker_id = self
            .get_broker_for_entity(entity_id)
            .ok_or(EngineError::NotFound(*entity_id))?;
        let guard = self.lock_broker(broker_id).await;
        Ok((broker_id, guard))
    }

    /// WAL-append then apply, while the caller holds the broker's write lock.
    pub(super) async fn persist_and_apply(
        &self,
        rs: &mut BrokerSchedule,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_schedule(rs, event, &self.entity_to_broker);
        Ok(())
    }

    /// Rewrite the WAL with only the events needed to recreate current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.compaction_gate.write().await;

        let mut broker_ids: Vec<Ulid> = self.state.iter().map(|e| *e.key()).collect();
        broker_ids.sort();

        let mut events = Vec::new();
        for broker_id in broker_ids {
            let Some(rs) = self.get_schedule(&broker_id) else {
                continue;
            };
            let guard = rs.read().await;
            snapshot_events(&guard, &mut events);
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::Storage("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Storage("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Storage(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

/// Events that rebuild `rs` exactly, capacity counters included.
fn snapshot_events(rs: &BrokerSchedule, events: &mut Vec<Event>) {
    let mut i = 0;
    while i < rs.windows.len() {
        let date = rs.windows[i].date;
        let windows: Vec<AvailabilityWindow> = rs.windows_on(date).cloned().collect();
        i += windows.len();
        events.push(Event::WindowsReplaced {
            broker_id: rs.broker_id,
            date,
            windows,
        });
    }
    for period in &rs.blocked {
        events.push(Event::BlockedPeriodCreated {
            period: period.clone(),
        });
    }
    for booking in &rs.bookings {
        events.push(Event::BookingRestored {
            booking: booking.clone(),
        });
    }
}
