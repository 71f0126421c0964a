//! Entry store use-case service.
//!
//! # Responsibility
//! - Own the authoritative in-memory entry sequence.
//! - Persist the whole sequence after every mutation.
//! - Publish snapshots to registered listeners after every change.
//!
//! # Invariants
//! - `entries` is sorted by `(date, seq)` after every load and mutation.
//! - `seq` values handed out by one store are strictly increasing; when the
//!   counter would overflow, entries are renumbered `1..=n` in display order.
//! - Persistence failures never surface as errors; they are reported through
//!   outcome values and logged.
//! - Habit text is never written to logs.

use crate::model::entry::{sort_entries, EntryId, HabitEntry};
use crate::repo::entry_repo::{EntryRepository, RepoError, StoredEntries};
use crate::service::clock::{Clock, SystemClock};
use log::{debug, info, warn};

/// Behaviour switches for [`EntryStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Also reject labels that are only whitespace.
    ///
    /// Off by default: only the empty string is rejected.
    pub reject_blank: bool,
}

/// Ordered view of the store at one revision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Incremented on every published change.
    pub revision: u64,
    /// Entries sorted ascending by `(date, seq)`.
    pub entries: Vec<HabitEntry>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Which path `load()` took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Stored data replaced the in-memory sequence.
    Loaded { count: usize },
    /// Nothing stored yet; state unchanged.
    Absent,
    /// Stored blob could not be decoded; state unchanged.
    Corrupt { reason: String },
    /// Storage could not be read; state unchanged.
    Unavailable { reason: String },
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }
}

/// Result of one best-effort write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// In-memory state is intact; persisted state is stale.
    Failed { reason: String },
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved)
    }
}

/// Why an add was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddRejection {
    Empty,
    Blank,
}

/// Result of `add()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added { id: EntryId, save: SaveOutcome },
    Rejected(AddRejection),
}

impl AddOutcome {
    pub fn added_id(&self) -> Option<EntryId> {
        match self {
            Self::Added { id, .. } => Some(*id),
            Self::Rejected(_) => None,
        }
    }
}

/// Handle returned by [`EntryStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Snapshot listener.
///
/// `Send` so a store can live behind a process-wide mutex.
pub type SnapshotListener = Box<dyn FnMut(&Snapshot) + Send>;

/// Owns the ordered entry sequence and its persistence.
pub struct EntryStore<R: EntryRepository, C: Clock = SystemClock> {
    repo: R,
    clock: C,
    options: StoreOptions,
    entries: Vec<HabitEntry>,
    next_seq: u64,
    revision: u64,
    listeners: Vec<(SubscriptionId, SnapshotListener)>,
    next_subscription: u64,
}

impl<R: EntryRepository> EntryStore<R, SystemClock> {
    /// Creates an empty store using the wall clock.
    pub fn new(repo: R) -> Self {
        Self::with_clock(repo, SystemClock, StoreOptions::default())
    }
}

impl<R: EntryRepository, C: Clock> EntryStore<R, C> {
    /// Creates an empty store with an explicit clock and options.
    ///
    /// Nothing is read from storage until [`EntryStore::load`].
    pub fn with_clock(repo: R, clock: C, options: StoreOptions) -> Self {
        Self {
            repo,
            clock,
            options,
            entries: Vec::new(),
            next_seq: 1,
            revision: 0,
            listeners: Vec::new(),
            next_subscription: 1,
        }
    }

    /// Current ordered entries.
    pub fn entries(&self) -> &[HabitEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an owned copy of the current state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            revision: self.revision,
            entries: self.entries.clone(),
        }
    }

    /// Reads the stored sequence, replacing in-memory state only on success.
    ///
    /// Absent, corrupt and unreadable storage all keep the current sequence.
    pub fn load(&mut self) -> LoadOutcome {
        let stored = match self.repo.load_entries() {
            Ok(stored) => stored,
            Err(err) => {
                let outcome = match &err {
                    RepoError::Storage(_) => LoadOutcome::Unavailable {
                        reason: err.to_string(),
                    },
                    _ => LoadOutcome::Corrupt {
                        reason: err.to_string(),
                    },
                };
                warn!(
                    "event=entries_load module=store status=error kept={} error={}",
                    self.entries.len(),
                    err
                );
                return outcome;
            }
        };

        let mut entries = match stored {
            StoredEntries::Absent => {
                info!("event=entries_load module=store status=absent");
                return LoadOutcome::Absent;
            }
            StoredEntries::Present(entries) => entries,
        };

        sort_entries(&mut entries);
        let count = entries.len();
        self.entries = entries;
        let max_seq = self.entries.iter().map(|entry| entry.seq).max().unwrap_or(0);
        match max_seq.checked_add(1) {
            Some(next) => self.next_seq = self.next_seq.max(next),
            None => self.renumber(),
        }

        info!("event=entries_load module=store status=ok count={count}");
        self.publish();
        LoadOutcome::Loaded { count }
    }

    /// Records a new entry stamped with the clock's current time.
    ///
    /// Rejects `""` without touching storage. With
    /// [`StoreOptions::reject_blank`], whitespace-only labels are rejected too.
    pub fn add(&mut self, habit: impl Into<String>) -> AddOutcome {
        let habit = habit.into();
        if habit.is_empty() {
            debug!("event=habit_add module=store status=rejected reason=empty");
            return AddOutcome::Rejected(AddRejection::Empty);
        }
        if self.options.reject_blank && habit.trim().is_empty() {
            debug!("event=habit_add module=store status=rejected reason=blank");
            return AddOutcome::Rejected(AddRejection::Blank);
        }

        let seq = self.allocate_seq();
        let entry = match HabitEntry::new(habit, self.clock.now_epoch_ms(), seq) {
            Ok(entry) => entry,
            Err(_) => return AddOutcome::Rejected(AddRejection::Empty),
        };
        let id = entry.id;

        self.entries.push(entry);
        // Appending is not enough: the clock may repeat or step backwards.
        sort_entries(&mut self.entries);

        info!(
            "event=habit_add module=store status=ok count={}",
            self.entries.len()
        );
        let save = self.save();
        self.publish();
        AddOutcome::Added { id, save }
    }

    /// Removes every entry and persists the empty sequence.
    pub fn clear_all(&mut self) -> SaveOutcome {
        let removed = self.entries.len();
        self.entries.clear();

        info!("event=entries_clear module=store status=ok removed={removed}");
        let save = self.save();
        self.publish();
        save
    }

    /// Writes the whole in-memory sequence under the storage key.
    ///
    /// Single attempt, no retry.
    pub fn save(&mut self) -> SaveOutcome {
        match self.repo.save_entries(&self.entries) {
            Ok(()) => {
                debug!(
                    "event=entries_save module=store status=ok count={}",
                    self.entries.len()
                );
                SaveOutcome::Saved
            }
            Err(err) => {
                warn!(
                    "event=entries_save module=store status=error count={} error={}",
                    self.entries.len(),
                    err
                );
                SaveOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Registers a listener called after every published change.
    ///
    /// The listener is not called for the current state.
    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&Snapshot) + Send + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    fn allocate_seq(&mut self) -> u64 {
        if self.next_seq.checked_add(1).is_none() {
            self.renumber();
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Rewrites `seq` as `1..=n` in current order.
    ///
    /// Only needed when stored data pushed the counter to `u64::MAX`; the
    /// order is unchanged because `entries` is already sorted.
    fn renumber(&mut self) {
        for (seq, entry) in (1u64..).zip(self.entries.iter_mut()) {
            entry.seq = seq;
        }
        self.next_seq = self.entries.len() as u64 + 1;
        warn!(
            "event=seq_renumber module=store status=ok count={}",
            self.entries.len()
        );
    }

    fn publish(&mut self) {
        self.revision += 1;
        if self.listeners.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for (_, listener) in &mut self.listeners {
            listener(&snapshot);
        }
    }
}
