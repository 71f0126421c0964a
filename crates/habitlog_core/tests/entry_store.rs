use habitlog_core::model::entry::is_sorted;
use habitlog_core::{
    AddOutcome, AddRejection, EntryStore, KeyValueStore, KvEntryRepository, KvError, KvResult,
    LoadOutcome, ManualClock, MemoryKvStore, SaveOutcome, Snapshot, SqliteKvStore, StoreOptions,
    ENTRIES_STORAGE_KEY,
};
use std::cell::Cell;
use std::sync::{Arc, Mutex};

const T1: i64 = 1_700_000_000_000;
const T2: i64 = 1_700_000_060_000;

fn store_over<'a>(
    kv: &'a MemoryKvStore,
    clock: &'a ManualClock,
) -> EntryStore<KvEntryRepository<&'a MemoryKvStore>, &'a ManualClock> {
    EntryStore::with_clock(KvEntryRepository::new(kv), clock, StoreOptions::default())
}

fn pairs(store_entries: &[habitlog_core::HabitEntry]) -> Vec<(String, i64)> {
    store_entries
        .iter()
        .map(|entry| (entry.habit.clone(), entry.date))
        .collect()
}

/// Counts writes and can be switched into a failing state.
#[derive(Default)]
struct FlakyKv {
    inner: MemoryKvStore,
    writes: Cell<usize>,
    fail_reads: Cell<bool>,
    fail_writes: Cell<bool>,
}

impl KeyValueStore for FlakyKv {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        if self.fail_reads.get() {
            return Err(KvError::Unavailable("read refused".to_string()));
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> KvResult<()> {
        self.writes.set(self.writes.get() + 1);
        if self.fail_writes.get() {
            return Err(KvError::Unavailable("disk full".to_string()));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> KvResult<()> {
        self.inner.remove(key)
    }
}

#[test]
fn add_then_clear_then_restart_matches_walkthrough() {
    let kv = MemoryKvStore::new();
    let clock = ManualClock::new(T1);
    let mut store = store_over(&kv, &clock);

    store.add("Walked dog");
    clock.set(T2);
    store.add("Read book");
    assert_eq!(
        pairs(store.entries()),
        vec![
            ("Walked dog".to_string(), T1),
            ("Read book".to_string(), T2)
        ]
    );

    assert_eq!(store.clear_all(), SaveOutcome::Saved);
    assert!(store.is_empty());

    let mut restarted = store_over(&kv, &clock);
    assert_eq!(restarted.load(), LoadOutcome::Loaded { count: 0 });
    assert!(restarted.is_empty());
}

#[test]
fn accepted_adds_are_counted_and_sorted() {
    let kv = MemoryKvStore::new();
    let clock = ManualClock::new(T1);
    let mut store = store_over(&kv, &clock);

    let labels = ["a", "", "b", "c", "", "d"];
    let mut accepted = 0;
    for (step, label) in labels.iter().enumerate() {
        clock.advance(if step % 2 == 0 { 1_000 } else { 0 });
        if let AddOutcome::Added { .. } = store.add(*label) {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 4);
    assert_eq!(store.len(), accepted);
    assert!(is_sorted(store.entries()));
}

#[test]
fn add_empty_string_is_noop_without_save() {
    let kv = FlakyKv::default();
    let clock = ManualClock::new(T1);
    let mut store =
        EntryStore::with_clock(KvEntryRepository::new(&kv), &clock, StoreOptions::default());

    assert_eq!(store.add(""), AddOutcome::Rejected(AddRejection::Empty));
    assert!(store.is_empty());
    assert_eq!(kv.writes.get(), 0);
    assert_eq!(kv.inner.get(ENTRIES_STORAGE_KEY).unwrap(), None);
}

#[test]
fn add_persists_under_fixed_key_as_json_array() {
    let kv = MemoryKvStore::new();
    let clock = ManualClock::new(T1);
    let mut store = store_over(&kv, &clock);

    let outcome = store.add("Walked dog");
    let id = outcome.added_id().expect("entry should be added");

    let blob = kv.get(ENTRIES_STORAGE_KEY).unwrap().expect("blob stored");
    let json: serde_json::Value = serde_json::from_str(&blob).unwrap();
    let items = json.as_array().expect("blob is a JSON array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], id.to_string());
    assert_eq!(items[0]["habit"], "Walked dog");
    assert_eq!(items[0]["date"], T1);
    assert_eq!(kv.len(), 1);
}

#[test]
fn save_then_load_on_fresh_store_reproduces_entries() {
    let kv = MemoryKvStore::new();
    let clock = ManualClock::new(T1);
    let mut writer = store_over(&kv, &clock);
    writer.add("Meditate");
    clock.advance(500);
    writer.add("Journal");
    assert_eq!(writer.save(), SaveOutcome::Saved);

    let mut reader = store_over(&kv, &clock);
    assert_eq!(reader.load(), LoadOutcome::Loaded { count: 2 });
    assert_eq!(pairs(reader.entries()), pairs(writer.entries()));
    assert_eq!(reader.entries(), writer.entries());
}

#[test]
fn load_sorts_unsorted_blob() {
    let kv = MemoryKvStore::new();
    kv.set(
        ENTRIES_STORAGE_KEY,
        r#"[
            {"id":"11111111-2222-4333-8444-555555555555","habit":"late","date":300},
            {"id":"21111111-2222-4333-8444-555555555555","habit":"early","date":"1970-01-01T00:00:00.100Z"},
            {"id":"31111111-2222-4333-8444-555555555555","habit":"middle","date":200}
        ]"#,
    )
    .unwrap();
    let clock = ManualClock::new(T1);
    let mut store = store_over(&kv, &clock);

    assert_eq!(store.load(), LoadOutcome::Loaded { count: 3 });
    let labels: Vec<&str> = store.entries().iter().map(|e| e.habit.as_str()).collect();
    assert_eq!(labels, vec!["early", "middle", "late"]);
}

#[test]
fn load_absent_key_leaves_state_empty() {
    let kv = MemoryKvStore::new();
    let clock = ManualClock::new(T1);
    let mut store = store_over(&kv, &clock);

    assert_eq!(store.load(), LoadOutcome::Absent);
    assert!(store.is_empty());
    assert_eq!(store.snapshot().revision, 0);
}

#[test]
fn load_garbage_blob_reports_corrupt_and_keeps_state() {
    let kv = MemoryKvStore::new();
    kv.set(ENTRIES_STORAGE_KEY, "not json at all {").unwrap();
    let clock = ManualClock::new(T1);
    let mut store = store_over(&kv, &clock);

    assert!(matches!(store.load(), LoadOutcome::Corrupt { .. }));
    assert!(store.is_empty());

    // Existing in-memory entries also survive a corrupt read.
    store.add("kept");
    kv.set(ENTRIES_STORAGE_KEY, "[{\"habit\":1}]").unwrap();
    assert!(matches!(store.load(), LoadOutcome::Corrupt { .. }));
    assert_eq!(store.len(), 1);
}

#[test]
fn load_read_failure_reports_unavailable() {
    let kv = FlakyKv::default();
    kv.fail_reads.set(true);
    let clock = ManualClock::new(T1);
    let mut store =
        EntryStore::with_clock(KvEntryRepository::new(&kv), &clock, StoreOptions::default());

    match store.load() {
        LoadOutcome::Unavailable { reason } => assert!(reason.contains("read refused")),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn write_failure_keeps_in_memory_state() {
    let kv = FlakyKv::default();
    kv.fail_writes.set(true);
    let clock = ManualClock::new(T1);
    let mut store =
        EntryStore::with_clock(KvEntryRepository::new(&kv), &clock, StoreOptions::default());

    match store.add("Walked dog") {
        AddOutcome::Added { save, .. } => {
            assert!(matches!(save, SaveOutcome::Failed { ref reason } if reason.contains("disk full")));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(store.len(), 1);
    assert_eq!(kv.writes.get(), 1);

    assert!(!store.clear_all().is_saved());
    assert!(store.is_empty());
    assert_eq!(kv.writes.get(), 2);
}

#[test]
fn custom_key_isolates_storage() {
    let kv = MemoryKvStore::new();
    let clock = ManualClock::new(T1);
    let mut store = EntryStore::with_clock(
        KvEntryRepository::with_key(&kv, "habits.test"),
        &clock,
        StoreOptions::default(),
    );

    store.add("x");
    assert_eq!(kv.get(ENTRIES_STORAGE_KEY).unwrap(), None);
    assert!(kv.get("habits.test").unwrap().is_some());
}

#[test]
fn listeners_receive_each_published_snapshot() {
    let kv = MemoryKvStore::new();
    let clock = ManualClock::new(T1);
    let mut store = store_over(&kv, &clock);
    let seen: Arc<Mutex<Vec<Snapshot>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    let subscription = store.subscribe(move |snapshot| {
        sink.lock().unwrap().push(snapshot.clone());
    });

    store.add("one");
    store.add("");
    clock.advance(10);
    store.add("two");
    store.clear_all();

    {
        let seen = seen.lock().unwrap();
        let lens: Vec<usize> = seen.iter().map(Snapshot::len).collect();
        let revisions: Vec<u64> = seen.iter().map(|s| s.revision).collect();
        assert_eq!(lens, vec![1, 2, 0]);
        assert_eq!(revisions, vec![1, 2, 3]);
        assert!(is_sorted(&seen[1].entries));
    }

    assert!(store.unsubscribe(subscription));
    assert!(!store.unsubscribe(subscription));
    store.add("three");
    assert_eq!(seen.lock().unwrap().len(), 3);
    assert_eq!(store.snapshot().revision, 4);
}

#[test]
fn sqlite_backed_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("habitlog.sqlite3");
    let clock = ManualClock::new(T1);

    {
        let kv = SqliteKvStore::open(&path).unwrap();
        let mut store =
            EntryStore::with_clock(KvEntryRepository::new(kv), &clock, StoreOptions::default());
        store.add("Walked dog");
        clock.set(T2);
        store.add("Read book");
    }

    let kv = SqliteKvStore::open(&path).unwrap();
    let mut store =
        EntryStore::with_clock(KvEntryRepository::new(kv), &clock, StoreOptions::default());
    assert_eq!(store.load(), LoadOutcome::Loaded { count: 2 });
    assert_eq!(
        pairs(store.entries()),
        vec![
            ("Walked dog".to_string(), T1),
            ("Read book".to_string(), T2)
        ]
    );
}

#[test]
fn load_replaces_non_empty_in_memory_sequence() {
    let kv = MemoryKvStore::new();
    let clock = ManualClock::new(T1);
    let mut store = store_over(&kv, &clock);
    store.add("old one");
    store.add("old two");

    kv.set(
        ENTRIES_STORAGE_KEY,
        r#"[
            {"id":"41111111-2222-4333-8444-555555555555","habit":"fresh b","date":1700000002000,"seq":2},
            {"id":"51111111-2222-4333-8444-555555555555","habit":"fresh a","date":1700000001000,"seq":1}
        ]"#,
    )
    .unwrap();

    assert_eq!(store.load(), LoadOutcome::Loaded { count: 2 });
    assert_eq!(
        pairs(store.entries()),
        vec![
            ("fresh a".to_string(), 1_700_000_001_000),
            ("fresh b".to_string(), 1_700_000_002_000)
        ]
    );
    assert!(store.entries().iter().all(|e| !e.habit.starts_with("old")));
}

#[test]
fn add_after_loading_max_seq_renumbers_instead_of_overflowing() {
    let kv = MemoryKvStore::new();
    kv.set(
        ENTRIES_STORAGE_KEY,
        &format!(
            r#"[
                {{"id":"11111111-2222-4333-8444-555555555555","habit":"a","date":{T1},"seq":{max}}},
                {{"id":"21111111-2222-4333-8444-555555555555","habit":"z","date":{T1},"seq":7}}
            ]"#,
            max = u64::MAX
        ),
    )
    .unwrap();
    let clock = ManualClock::new(T2);
    let mut store = store_over(&kv, &clock);

    assert_eq!(store.load(), LoadOutcome::Loaded { count: 2 });
    let labels: Vec<&str> = store.entries().iter().map(|e| e.habit.as_str()).collect();
    assert_eq!(labels, vec!["z", "a"]);

    let outcome = store.add("b");
    assert!(outcome.added_id().is_some());
    let seqs: Vec<u64> = store.entries().iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
    let labels: Vec<&str> = store.entries().iter().map(|e| e.habit.as_str()).collect();
    assert_eq!(labels, vec!["z", "a", "b"]);
}

#[test]
fn load_accepts_fractional_epoch_seconds() {
    let kv = MemoryKvStore::new();
    kv.set(
        ENTRIES_STORAGE_KEY,
        r#"[{"id":"11111111-2222-4333-8444-555555555555","habit":"Swim","date":1700000000.5}]"#,
    )
    .unwrap();
    let clock = ManualClock::new(T1);
    let mut store = store_over(&kv, &clock);

    assert_eq!(store.load(), LoadOutcome::Loaded { count: 1 });
    assert_eq!(store.entries()[0].date, 1_700_000_000_500);
}
