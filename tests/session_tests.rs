use anyhow::Result;
use ctxmenu::model::tracker::{ChangeEvent, WorkingSet};
use ctxmenu::model::{MenuItem, Scenario};
use ctxmenu::mutation::{MutationEngine, WriteOutcome};
use ctxmenu::notify::RecordingNotifier;
use ctxmenu::scanner::NamespaceScanner;
use ctxmenu::session::{BEFORE_APPLY, BEFORE_RESET, BEFORE_RESTORE, Session};
use ctxmenu::storage::ROLLBACK_DEFAULT_LABEL;
use ctxmenu::store::memory::MemoryStore;
use ctxmenu::store::{RegistryStore, Scope};
use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use tempfile::{TempDir, tempdir};

mod common;
use common::{sample_store, seed_command, session_options};

struct Fixture {
    dir: TempDir,
    store: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
    session: Session,
}

impl Fixture {
    fn new() -> Result<Self> {
        Self::with_store(sample_store())
    }

    fn with_store(store: MemoryStore) -> Result<Self> {
        let dir = tempdir()?;
        let store = Arc::new(store);
        let notifier = Arc::new(RecordingNotifier::default());
        let session = Session::with_options(session_options(dir.path()), store.clone(), notifier.clone());
        Ok(Self {
            dir,
            store,
            notifier,
            session,
        })
    }

    /// A second session over the same store, as a later run would see it.
    fn reopen(&self) -> Session {
        Session::with_options(
            session_options(self.dir.path()),
            self.store.clone(),
            Arc::new(RecordingNotifier::default()),
        )
    }
}

fn state(items: &[MenuItem], scenario: Scenario, id: &str) -> Option<bool> {
    items
        .iter()
        .find(|item| item.scenario == scenario && item.matches_id(id))
        .map(MenuItem::is_enabled)
}

#[test]
fn test_apply_persists_and_rescan_agrees() -> Result<()> {
    let mut fx = Fixture::new()?;
    fx.session.set_enabled_by_id(Scenario::Directory, "git_gui", false)?;
    fx.session.set_enabled_by_id(Scenario::File, "7-Zip", false)?;

    let report = fx.session.apply()?;
    assert_eq!(report.success_count, 2);
    assert!(report.is_complete());
    assert!(!fx.session.has_unapplied_changes());
    assert_eq!(fx.notifier.count(), 1);

    let later = fx.reopen();
    assert_eq!(state(later.items(), Scenario::Directory, "git_gui"), Some(false));
    assert_eq!(state(later.items(), Scenario::File, "7-Zip"), Some(false));
    assert_eq!(state(later.items(), Scenario::File, "Code"), Some(true));
    Ok(())
}

#[test]
fn test_backup_precedes_every_apply() -> Result<()> {
    let mut fx = Fixture::new()?;
    fx.session.set_enabled_by_id(Scenario::DesktopBackground, "Display", false)?;
    fx.session.apply()?;

    let backups = fx.session.backups().list_backups()?;
    assert_eq!(backups.len(), 2);
    assert_eq!(backups[0].description, BEFORE_APPLY);
    assert_eq!(backups[1].description, ROLLBACK_DEFAULT_LABEL);
    // The backup holds the state before the change
    assert_eq!(backups[0].disabled_count(), 0);
    Ok(())
}

#[test]
fn test_partial_failure_keeps_failed_items_dirty() -> Result<()> {
    let store = sample_store();
    store.deny_writes_containing(r"Directory\Background\shell\Code");
    let mut fx = Fixture::with_store(store)?;

    for scenario in [Scenario::File, Scenario::Directory, Scenario::DirectoryBackground] {
        fx.session.set_enabled_by_id(scenario, "Code", false)?;
    }
    let report = fx.session.apply()?;

    assert_eq!(report.success_count, 2);
    assert_eq!(report.fail_count, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].key.scenario, Scenario::DirectoryBackground);

    let pending = fx.session.pending_items();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].scenario, Scenario::DirectoryBackground);
    assert!(fx.session.has_unapplied_changes());
    assert_eq!(fx.notifier.count(), 1);

    let later = fx.reopen();
    assert_eq!(state(later.items(), Scenario::File, "Code"), Some(false));
    assert_eq!(state(later.items(), Scenario::DirectoryBackground, "Code"), Some(true));
    Ok(())
}

#[test]
fn test_three_of_five_failures_are_accounted_per_item() -> Result<()> {
    let store = sample_store();
    for denied in [
        r"Directory\Background\shell\Code",
        r"Directory\shell\git_gui",
        r"DesktopBackground\shell\Display",
    ] {
        store.deny_writes_containing(denied);
    }
    let mut fx = Fixture::with_store(store)?;

    let edits = [
        (Scenario::File, "Code", true),
        (Scenario::Directory, "Code", true),
        (Scenario::DirectoryBackground, "Code", false),
        (Scenario::Directory, "git_gui", false),
        (Scenario::DesktopBackground, "Display", false),
    ];
    for (scenario, id, _) in edits {
        fx.session.set_enabled_by_id(scenario, id, false)?;
    }
    assert_eq!(fx.session.pending_items().len(), 5);

    let report = fx.session.apply()?;
    assert_eq!(report.success_count, 2);
    assert_eq!(report.fail_count, 3);
    assert_eq!(report.failures.len(), 3);

    for (scenario, id, succeeds) in edits {
        let item = fx
            .session
            .items()
            .iter()
            .find(|item| item.scenario == scenario && item.matches_id(id))
            .unwrap();
        assert_eq!(item.has_changes(), !succeeds, "{scenario} {id}");
        assert!(!item.is_enabled());
    }
    Ok(())
}

#[test]
fn test_mutations_are_idempotent() -> Result<()> {
    let store = Arc::new(sample_store());
    let engine = MutationEngine::new(store.clone());
    let items = NamespaceScanner::new(store.clone()).scan_all();

    for item in &items {
        assert!(engine.disable(item).is_written(), "{}", item.id);
        let once = store.image();
        assert!(engine.disable(item).is_written());
        assert_eq!(once, store.image(), "second disable of {} changed the store", item.id);

        assert!(engine.enable(item).is_written());
        let once = store.image();
        assert!(engine.enable(item).is_written());
        assert_eq!(once, store.image(), "second enable of {} changed the store", item.id);
    }
    Ok(())
}

#[test]
fn test_unprivileged_disable_falls_back_to_user_overlay() -> Result<()> {
    let store = sample_store();
    store.set_system_writable(false);
    let store = Arc::new(store);
    let engine = MutationEngine::new(store.clone());

    let items = NamespaceScanner::new(store.clone()).scan(Scenario::Directory);
    let git_gui = items.iter().find(|item| item.id == "git_gui").unwrap();
    assert!(git_gui.requires_admin);

    assert_eq!(engine.disable(git_gui), WriteOutcome::Written(Scope::UserScope));
    assert!(
        store
            .get_value(Scope::UserScope, r"Software\Classes\Directory\shell\git_gui", "LegacyDisable")?
            .is_some()
    );

    let rescanned = NamespaceScanner::new(store.clone()).scan(Scenario::Directory);
    let git_gui = rescanned.iter().find(|item| item.id == "git_gui").unwrap();
    assert!(!git_gui.is_enabled());

    // The overlay is user-owned, so enabling works without elevation too
    assert!(engine.enable(git_gui).is_written());
    let rescanned = NamespaceScanner::new(store).scan(Scenario::Directory);
    assert_eq!(state(&rescanned, Scenario::Directory, "git_gui"), Some(true));
    Ok(())
}

#[test]
fn test_unprivileged_block_falls_back_to_user_list() -> Result<()> {
    let store = sample_store();
    store.set_system_writable(false);
    let mut fx = Fixture::with_store(store)?;

    fx.session.set_enabled_by_id(Scenario::File, "7-Zip", false)?;
    assert!(fx.session.apply()?.is_complete());
    assert_eq!(state(fx.reopen().items(), Scenario::File, "7-Zip"), Some(false));
    Ok(())
}

#[test]
fn test_user_overlay_keeps_machine_verb_details_across_runs() -> Result<()> {
    let store = MemoryStore::new();
    let verb = r"Software\Classes\Directory\shell\foo_verb";
    store.seed_value(Scope::SystemScope, verb, "MUIVerb", "Open in Foo");
    store.seed_value(
        Scope::SystemScope,
        &format!(r"{verb}\command"),
        "",
        r#""C:\Program Files\Foo Corp\foo.exe" "%V""#,
    );
    store.set_system_writable(false);
    let mut fx = Fixture::with_store(store)?;

    let describe = |session: &Session| {
        let item = session
            .items()
            .iter()
            .find(|item| item.id == "foo_verb")
            .cloned()
            .unwrap();
        (
            item.display_name,
            item.command.is_some(),
            item.source_name,
            item.registry_scope,
        )
    };
    let before = describe(&fx.session);
    assert_eq!(before.0, "Open in Foo");
    assert_eq!(before.2, "Foo Corp");

    fx.session.set_enabled_by_id(Scenario::Directory, "foo_verb", false)?;
    assert!(fx.session.apply()?.is_complete());
    assert!(fx.store.get_value(Scope::UserScope, verb, "LegacyDisable")?.is_some());

    let later = fx.reopen();
    assert_eq!(describe(&later), before);
    assert_eq!(state(later.items(), Scenario::Directory, "foo_verb"), Some(false));

    // Enabling leaves an empty user key behind, which must not shadow the verb
    let mut later = later;
    later.set_enabled_by_id(Scenario::Directory, "foo_verb", true)?;
    assert!(later.apply()?.is_complete());
    let last = fx.reopen();
    assert_eq!(describe(&last), before);
    assert_eq!(state(last.items(), Scenario::Directory, "foo_verb"), Some(true));
    Ok(())
}

#[test]
fn test_enable_reports_failure_when_machine_marker_remains() -> Result<()> {
    let store = sample_store();
    store.seed_value(
        Scope::SystemScope,
        r"Software\Classes\Directory\shell\git_gui",
        "LegacyDisable",
        "",
    );
    store.set_system_writable(false);
    let mut fx = Fixture::with_store(store)?;
    assert_eq!(state(fx.session.items(), Scenario::Directory, "git_gui"), Some(false));

    fx.session.set_enabled_by_id(Scenario::Directory, "git_gui", true)?;
    let report = fx.session.apply()?;

    assert_eq!(report.success_count, 0);
    assert_eq!(report.fail_count, 1);
    assert!(fx.session.has_unapplied_changes());
    assert_eq!(fx.notifier.count(), 0);
    assert_eq!(state(fx.reopen().items(), Scenario::Directory, "git_gui"), Some(false));
    Ok(())
}

#[test]
fn test_out_of_band_marker_is_seen_after_refresh_and_enable_clears_both() -> Result<()> {
    let mut fx = Fixture::new()?;
    let verb = r"Software\Classes\Directory\shell\git_gui";

    fx.session.set_enabled_by_id(Scenario::Directory, "git_gui", false)?;
    fx.session.apply()?;
    assert!(fx.store.get_value(Scope::SystemScope, verb, "LegacyDisable")?.is_some());

    // Another tool adds the overlay marker as well
    fx.store.seed_value(Scope::UserScope, verb, "LegacyDisable", "");
    fx.session.refresh();
    assert_eq!(state(fx.session.items(), Scenario::Directory, "git_gui"), Some(false));

    fx.session.set_enabled_by_id(Scenario::Directory, "git_gui", true)?;
    assert!(fx.session.apply()?.is_complete());
    assert!(fx.store.get_value(Scope::SystemScope, verb, "LegacyDisable")?.is_none());
    assert!(fx.store.get_value(Scope::UserScope, verb, "LegacyDisable")?.is_none());

    // A marker written out of band after the scan surfaces on the next one
    fx.store.seed_value(Scope::SystemScope, verb, "LegacyDisable", "");
    assert_eq!(state(fx.session.items(), Scenario::Directory, "git_gui"), Some(true));
    fx.session.refresh();
    assert_eq!(state(fx.session.items(), Scenario::Directory, "git_gui"), Some(false));
    assert!(!fx.session.has_unapplied_changes());
    Ok(())
}

#[test]
fn test_restore_only_touches_differing_items() -> Result<()> {
    let mut fx = Fixture::new()?;
    let snapshot = fx.session.backup("checkpoint")?;
    let image = fx.store.image();

    fx.session.set_enabled_by_id(Scenario::Directory, "notes", false)?;
    fx.session.apply()?;
    assert_ne!(image, fx.store.image());

    let report = fx.session.restore(&snapshot)?;
    assert_eq!(report.success_count, 1);
    assert_eq!(report.fail_count, 0);
    assert_eq!(image, fx.store.image());
    assert!(!fx.session.has_unapplied_changes());

    let latest = fx.session.backups().latest()?.unwrap();
    assert_eq!(latest.description, BEFORE_RESTORE);
    Ok(())
}

#[test]
fn test_restore_covers_every_copy_of_an_id() -> Result<()> {
    let store = MemoryStore::new();
    for base in ["*", "AllFilesystemObjects"] {
        seed_command(&store, Scope::SystemScope, base, "foo", "foo.exe");
    }
    let mut fx = Fixture::with_store(store)?;
    let snapshot = fx.session.backup("checkpoint")?;
    assert_eq!(snapshot.entries.len(), 2);

    for base in ["*", "AllFilesystemObjects"] {
        fx.store.seed_value(
            Scope::SystemScope,
            &format!(r"Software\Classes\{base}\shell\foo"),
            "LegacyDisable",
            "",
        );
    }
    fx.session.refresh();
    assert!(fx.session.items().iter().all(|item| !item.is_enabled()));

    let report = fx.session.restore(&snapshot)?;
    assert_eq!(report.success_count, 2);
    assert!(fx.reopen().items().iter().all(MenuItem::is_enabled));
    Ok(())
}

#[test]
fn test_set_by_id_toggles_every_copy_in_the_scenario() -> Result<()> {
    let store = MemoryStore::new();
    for base in ["*", "AllFilesystemObjects"] {
        seed_command(&store, Scope::SystemScope, base, "foo", "foo.exe");
    }
    let mut fx = Fixture::with_store(store)?;

    assert!(fx.session.set_enabled_by_id(Scenario::File, "foo", false)?);
    assert_eq!(fx.session.pending_items().len(), 2);
    assert_eq!(fx.session.apply()?.success_count, 2);
    assert!(fx.reopen().items().iter().all(|item| !item.is_enabled()));
    Ok(())
}

#[test]
fn test_restore_writes_store_despite_matching_pending_edit() -> Result<()> {
    let mut fx = Fixture::new()?;
    let verb = r"Software\Classes\DesktopBackground\shell\Display";

    fx.session.set_enabled_by_id(Scenario::DesktopBackground, "Display", false)?;
    fx.session.apply()?;
    let disabled = fx.session.backup("display off")?;
    fx.session.set_enabled_by_id(Scenario::DesktopBackground, "Display", true)?;
    fx.session.apply()?;
    assert!(fx.store.get_value(Scope::SystemScope, verb, "LegacyDisable")?.is_none());

    // Pending edit already equal to the recorded state
    fx.session.set_enabled_by_id(Scenario::DesktopBackground, "Display", false)?;
    let report = fx.session.restore(&disabled)?;

    assert_eq!(report.success_count, 1);
    assert!(fx.store.get_value(Scope::SystemScope, verb, "LegacyDisable")?.is_some());
    assert!(!fx.session.has_unapplied_changes());
    Ok(())
}

#[test]
fn test_restore_from_disk_round_trip() -> Result<()> {
    let mut fx = Fixture::new()?;
    fx.session.set_enabled_by_id(Scenario::File, "7-Zip", false)?;
    fx.session.apply()?;
    let disabled = fx.session.backup("zip off")?;

    let loaded = fx.session.backups().load_backup(&disabled.file_path)?;
    assert_eq!(loaded, disabled);
    assert_eq!(loaded.disabled_count(), 1);

    fx.session.set_enabled_by_id(Scenario::File, "7-Zip", true)?;
    fx.session.apply()?;

    let resolved = fx.session.backups().resolve(&disabled.file_name())?;
    let report = fx.session.restore(&resolved)?;
    assert_eq!(report.success_count, 1);
    assert_eq!(state(fx.reopen().items(), Scenario::File, "7-Zip"), Some(false));
    Ok(())
}

#[test]
fn test_restore_skips_entries_without_live_item() -> Result<()> {
    let mut fx = Fixture::new()?;
    let mut record = fx.session.backup("checkpoint")?;
    for entry in &mut record.entries {
        entry.id = format!("{}-uninstalled", entry.id);
        entry.registry_path = format!("{}-uninstalled", entry.registry_path);
        entry.was_enabled = false;
    }

    let report = fx.session.restore(&record)?;
    assert_eq!(report.success_count + report.fail_count, 0);
    assert_eq!(fx.notifier.count(), 0);
    Ok(())
}

#[test]
fn test_reset_to_default_restores_first_run_state() -> Result<()> {
    let mut fx = Fixture::new()?;
    let original = fx.store.image();

    fx.session.set_enabled_by_id(Scenario::Directory, "git_gui", false)?;
    fx.session.set_enabled_by_id(Scenario::Directory, "notes", false)?;
    fx.session.apply()?;

    // A later run must not replace the rollback default
    let mut later = fx.reopen();
    let report = later.reset_to_default()?;
    assert_eq!(report.success_count, 2);
    assert_eq!(original, fx.store.image());

    let backups = later.backups().list_backups()?;
    assert_eq!(backups[0].description, BEFORE_RESET);
    assert_eq!(
        backups.iter().filter(|record| record.is_rollback_default()).count(),
        1
    );
    Ok(())
}

#[test]
fn test_sync_fans_out_to_other_scenarios() -> Result<()> {
    let mut fx = Fixture::new()?;
    fx.session.set_enabled_by_id(Scenario::File, "Code", false)?;

    let changed = fx.session.sync_pending_changes(
        Scenario::File,
        &[Scenario::Directory, Scenario::DirectoryBackground, Scenario::DesktopBackground],
    );
    assert_eq!(changed, 2);
    assert_eq!(fx.session.pending_items().len(), 3);

    let report = fx.session.apply()?;
    assert_eq!(report.success_count, 3);

    let later = fx.reopen();
    for scenario in [Scenario::File, Scenario::Directory, Scenario::DirectoryBackground] {
        assert_eq!(state(later.items(), scenario, "Code"), Some(false), "{scenario}");
    }
    Ok(())
}

#[test]
fn test_observers_see_every_change() -> Result<()> {
    let mut fx = Fixture::new()?;
    let events: Arc<Mutex<Vec<ChangeEvent>>> = Arc::default();
    let sink = Arc::clone(&events);
    fx.session
        .subscribe(Box::new(move |event: &ChangeEvent| sink.lock().unwrap().push(event.clone())));

    fx.session.set_enabled_by_id(Scenario::Directory, "notes", false)?;
    fx.session.set_enabled_by_id(Scenario::Directory, "notes", false)?;
    fx.session.set_enabled_by_id(Scenario::Directory, "notes", true)?;

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert!(events[0].has_unapplied_changes);
    assert!(!events[1].has_unapplied_changes);
    Ok(())
}

proptest! {
    #[test]
    fn test_dirty_flags_track_every_edit(edits in prop::collection::vec((0usize..8, any::<bool>()), 0..64)) {
        let store: Arc<dyn RegistryStore> = Arc::new(sample_store());
        let mut set = WorkingSet::new(NamespaceScanner::new(store).scan_all());
        let committed: Vec<bool> = set.items().iter().map(MenuItem::original_is_enabled).collect();

        for (index, value) in edits {
            set.set_enabled(index % set.items().len(), value);

            for (item, original) in set.items().iter().zip(&committed) {
                prop_assert_eq!(item.original_is_enabled(), *original);
                prop_assert_eq!(item.has_changes(), item.is_enabled() != item.original_is_enabled());
            }
            let any_dirty = set.items().iter().any(MenuItem::has_changes);
            prop_assert_eq!(set.has_unapplied_changes(), any_dirty);
            prop_assert_eq!(set.dirty_indices().is_empty(), !any_dirty);
        }
    }
}
