use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use taskbell_core::app::{TaskBell, TaskDraft};
use taskbell_core::notify::{Notice, RecordingNotifier, SoundStyle};
use taskbell_core::reminder::ReminderDriver;
use taskbell_core::store::{FileKeyValueStore, KeyValueStore, TaskStore};
use taskbell_core::task::{Status, Task};
use taskbell_core::view::SortKey;
use tempfile::tempdir;

fn open_store(dir: &std::path::Path) -> TaskStore<FileKeyValueStore> {
    let backend = FileKeyValueStore::open(dir).expect("open file store");
    TaskStore::new(backend, "taskbell_tasks_fixed")
}

#[test]
fn file_store_roundtrip_preserves_tasks() {
    let temp = tempdir().expect("tempdir");
    let store = open_store(temp.path());

    let now = Utc::now();
    let mut task = Task::new_todo("Réviser le partiel".to_string(), now);
    task.tags = vec!["exam".to_string()];
    task.due = Some("2026-06-01T09:00:00Z".to_string());
    task.reminder_min = 30;
    task.subtasks = vec!["chapitre 1".to_string()];

    store.save(std::slice::from_ref(&task)).expect("save tasks");

    let reopened = open_store(temp.path());
    assert_eq!(reopened.load(), vec![task]);
}

#[test]
fn create_filter_and_clear_flow() {
    let temp = tempdir().expect("tempdir");
    let recorder = Arc::new(RecordingNotifier::new());
    let mut bell = TaskBell::new(open_store(temp.path()), Box::new(Arc::clone(&recorder)));
    let now = Utc::now();

    let mut urgent = TaskDraft::titled("Rendre le rapport");
    urgent.priority = Some("Urgente".to_string());
    urgent.tags = "travail, q1".to_string();
    urgent.due = Some((now + Duration::days(2)).to_rfc3339());
    let urgent = bell.create(urgent, now).expect("create").expect("task");

    let mut chores = TaskDraft::titled("Courses");
    chores.category = Some("Perso".to_string());
    let chores = bell.create(chores, now + Duration::seconds(1)).expect("create").expect("task");

    assert_eq!(bell.visible().len(), 2);

    bell.view.search = "Q1".to_string();
    let found = bell.visible();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, urgent.id);

    bell.view.search.clear();
    bell.view.sort = SortKey::DueAsc;
    let ordered: Vec<String> = bell.visible().into_iter().map(|t| t.id).collect();
    assert_eq!(ordered, vec![urgent.id.clone(), chores.id.clone()]);

    assert_eq!(bell.toggle_done(&urgent.id, true).expect("toggle"), Some(Status::Done));
    bell.view.filters.set_status("done").expect("status filter");
    assert_eq!(bell.visible().len(), 1);

    assert_eq!(bell.clear_completed().expect("clear done"), 1);
    bell.view.filters.set_status("all").expect("status filter");
    let remaining = open_store(temp.path()).load();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, chores.id);

    let progress = bell.progress();
    assert_eq!((progress.total, progress.done, progress.percent), (1, 0, 0));
    assert!(!recorder.toasts().is_empty());
}

#[test]
fn legacy_blob_loads_normalized() {
    let temp = tempdir().expect("tempdir");
    let backend = FileKeyValueStore::open(temp.path()).expect("open file store");
    backend
        .set(
            "taskbell_tasks_fixed",
            r#"[
                {"id":"old-1","title":"Ancienne","done":true,"createdAt":1,"reminderMin":"10"},
                {"id":"old-2","title":"Encore","createdAt":2,"due":""},
                42
            ]"#,
        )
        .expect("seed blob");

    let tasks = open_store(temp.path()).load();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].status(), Status::Done);
    assert_eq!(tasks[0].reminder_min, 10);
    assert_eq!(tasks[1].status(), Status::Todo);
    assert_eq!(tasks[1].due, None);
    assert_eq!(tasks[1].category, "Études");
}

#[tokio::test]
async fn reminder_driver_fires_and_stops() {
    let temp = tempdir().expect("tempdir");
    let now = Utc::now();

    let mut task = Task::new_todo("Appeler le labo".to_string(), now);
    task.due = Some((now + Duration::minutes(4)).to_rfc3339());
    task.reminder_min = 5;
    open_store(temp.path()).save(&[task.clone()]).expect("seed task");

    let recorder = Arc::new(RecordingNotifier::new());
    let shared = TaskBell::new(open_store(temp.path()), Box::new(Arc::clone(&recorder)))
        .with_sound_style(SoundStyle::Chime)
        .into_shared();

    let mut driver = ReminderDriver::start(Arc::clone(&shared), StdDuration::from_millis(20));
    tokio::time::sleep(StdDuration::from_millis(150)).await;
    assert!(driver.is_running());
    driver.stop();
    assert!(!driver.is_running());

    let notices = recorder.notices();
    assert_eq!(
        notices,
        vec![
            Notice::Toast("🔔 Rappel : Appeler le labo".to_string()),
            Notice::Sound(SoundStyle::Chime),
        ]
    );

    let stored = open_store(temp.path()).load();
    assert!(stored[0].reminded_at.is_some());
}
