use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::notify::{Notifier, SoundStyle};
use crate::reminder::{ReminderPolicy, SharedTaskBell, due_reminders};
use crate::store::{KeyValueStore, TaskStore};
use crate::task::{
    DEFAULT_CATEGORY, DEFAULT_PRIORITY, Status, Task, parse_subtasks, parse_tags,
};
use crate::view::{Progress, ViewState, apply_view};

/// Raw form input for a new task. Tags are comma separated, subtasks one per
/// line.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub due: Option<String>,
    pub tags: String,
    pub reminder_min: u32,
    pub note: String,
    pub subtasks: String,
}

impl TaskDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    fn into_task(self, now: DateTime<Utc>) -> Option<Task> {
        let title = self.title.trim();
        if title.is_empty() {
            return None;
        }

        let mut task = Task::new_todo(title.to_string(), now);
        task.category = non_blank(self.category).unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        task.priority = non_blank(self.priority).unwrap_or_else(|| DEFAULT_PRIORITY.to_string());
        task.due = non_blank(self.due);
        task.tags = parse_tags(&self.tags);
        task.reminder_min = self.reminder_min;
        task.note = self.note.trim().to_string();
        task.subtasks = parse_subtasks(&self.subtasks);
        Some(task)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Session context: the persisted collection, the toolbar state and the
/// notification sink. Every operation reloads the store, applies its change and
/// writes the whole collection back.
pub struct TaskBell<S> {
    store: TaskStore<S>,
    pub view: ViewState,
    policy: ReminderPolicy,
    sound_style: SoundStyle,
    notifier: Box<dyn Notifier>,
}

impl<S: KeyValueStore> TaskBell<S> {
    pub fn new(store: TaskStore<S>, notifier: Box<dyn Notifier>) -> Self {
        Self {
            store,
            view: ViewState::default(),
            policy: ReminderPolicy::default(),
            sound_style: SoundStyle::default(),
            notifier,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ReminderPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_sound_style(mut self, style: SoundStyle) -> Self {
        self.sound_style = style;
        self
    }

    pub fn into_shared(self) -> SharedTaskBell<S> {
        Arc::new(Mutex::new(self))
    }

    pub fn store(&self) -> &TaskStore<S> {
        &self.store
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.store.load()
    }

    pub fn find(&self, id: &str) -> Option<Task> {
        self.store.load().into_iter().find(|task| task.id == id)
    }

    pub fn visible(&self) -> Vec<Task> {
        apply_view(&self.store.load(), &self.view)
    }

    pub fn progress(&self) -> Progress {
        Progress::from_tasks(&self.store.load())
    }

    /// Selects `id` if it exists. An unknown id clears the selection.
    pub fn select(&mut self, id: &str) -> Option<Task> {
        let found = self.find(id);
        self.view.selected_id = found.as_ref().map(|task| task.id.clone());
        found
    }

    /// Resolves the selection, dropping it when the task is gone.
    pub fn selected_task(&mut self) -> Option<Task> {
        let id = self.view.selected_id.clone()?;
        let found = self.find(&id);
        if found.is_none() {
            debug!(id = %id, "selected task no longer exists");
            self.view.selected_id = None;
        }
        found
    }

    #[instrument(skip(self, draft, now), fields(title = %draft.title))]
    pub fn create(&mut self, draft: TaskDraft, now: DateTime<Utc>) -> anyhow::Result<Option<Task>> {
        let Some(task) = draft.into_task(now) else {
            warn!("rejected task without title");
            self.notifier.toast("⚠️ Écris un titre de tâche");
            return Ok(None);
        };

        let mut tasks = self.store.load();
        tasks.push(task.clone());
        self.store.save(&tasks)?;
        self.view.selected_id = Some(task.id.clone());

        info!(id = %task.id, "task added");
        self.notifier.toast("✅ Tâche ajoutée et sauvegardée !");
        if let Err(err) = self.scan_reminders(now) {
            warn!(error = %format!("{err:#}"), "reminder scan after create failed");
        }
        Ok(Some(task))
    }

    #[instrument(skip(self))]
    pub fn delete(&mut self, id: &str) -> anyhow::Result<bool> {
        let mut tasks = self.store.load();
        let before = tasks.len();
        tasks.retain(|task| task.id != id);
        let removed = tasks.len() != before;

        if removed {
            self.store.save(&tasks)?;
            self.notifier.toast("🗑 Tâche supprimée");
            info!(id, "task deleted");
        } else {
            debug!(id, "delete of unknown task ignored");
        }

        if self.view.selected_id.as_deref() == Some(id) {
            self.view.selected_id = None;
        }
        Ok(removed)
    }

    #[instrument(skip(self))]
    pub fn cycle_status(&mut self, id: &str) -> anyhow::Result<Option<Status>> {
        let mut tasks = self.store.load();
        let Some(task) = tasks.iter_mut().find(|task| task.id == id) else {
            debug!(id, "cycle on unknown task ignored");
            return Ok(None);
        };

        let status = task.cycle_status();
        self.store.save(&tasks)?;

        info!(id, %status, "status cycled");
        self.notifier.toast(&format!("Statut → {}", status.label()));
        Ok(Some(status))
    }

    #[instrument(skip(self))]
    pub fn toggle_done(&mut self, id: &str, checked: bool) -> anyhow::Result<Option<Status>> {
        let mut tasks = self.store.load();
        let Some(task) = tasks.iter_mut().find(|task| task.id == id) else {
            debug!(id, "toggle on unknown task ignored");
            return Ok(None);
        };

        task.set_done(checked);
        let status = task.status();
        self.store.save(&tasks)?;

        info!(id, %status, "done toggled");
        Ok(Some(status))
    }

    #[instrument(skip(self))]
    pub fn clear_all(&mut self) -> anyhow::Result<()> {
        self.store.save(&[])?;
        self.view.selected_id = None;
        info!("cleared all tasks");
        self.notifier.toast("🧹 Tout supprimé");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn clear_completed(&mut self) -> anyhow::Result<usize> {
        let tasks = self.store.load();
        let before = tasks.len();
        let keep: Vec<Task> = tasks
            .into_iter()
            .filter(|task| task.status() != Status::Done)
            .collect();
        let removed = before - keep.len();
        self.store.save(&keep)?;

        if let Some(selected) = self.view.selected_id.as_deref()
            && !keep.iter().any(|task| task.id == selected)
        {
            self.view.selected_id = None;
        }

        info!(removed, "cleared completed tasks");
        self.notifier.toast("✅ Terminées supprimées");
        Ok(removed)
    }

    /// Appends two sample tasks and selects the first one.
    #[instrument(skip(self, now))]
    pub fn seed_demo(&mut self, now: DateTime<Utc>) -> anyhow::Result<Vec<Task>> {
        let base = now.timestamp_millis();

        let mut revision = Task::new_todo("Révision – analyse de projet".to_string(), now);
        revision.priority = "Haute".to_string();
        revision.tags = vec!["révision".to_string(), "unistra".to_string()];
        revision.note = "Faire un plan + exemples".to_string();
        revision.subtasks = vec![
            "analyse de projet".to_string(),
            "communication".to_string(),
            "wordpress".to_string(),
        ];
        revision.created_at = base + 1;

        let mut feedback = Task::new_todo("Préparer feedback (contact)".to_string(), now);
        feedback.category = "Admin".to_string();
        feedback.tags = vec!["feedback".to_string(), "ui".to_string()];
        feedback.note = "Vérifier texte 24–48h".to_string();
        feedback.subtasks = vec!["relire".to_string(), "tester".to_string(), "publier".to_string()];
        feedback.status = Some(Status::Pending);
        feedback.created_at = base + 2;

        let seeded = vec![revision, feedback];
        let mut tasks = self.store.load();
        tasks.extend(seeded.iter().cloned());
        self.store.save(&tasks)?;
        self.view.selected_id = Some(seeded[0].id.clone());

        info!(count = seeded.len(), "seeded demo tasks");
        self.notifier.toast("✅ 2 exemples ajoutés !");
        Ok(seeded)
    }

    /// Manual reminder for one task. Nothing is persisted.
    pub fn remind_now(&self, id: &str) -> bool {
        let Some(task) = self.find(id) else {
            debug!(id, "manual reminder for unknown task ignored");
            return false;
        };
        self.notify_reminder(&task);
        true
    }

    pub fn test_notification(&self) {
        self.notifier.toast("🔔 Test notification");
        self.notifier.play(self.sound_style);
    }

    pub fn preview_sound(&self) {
        self.notifier.toast("🔊 Aperçu du son");
        self.notifier.play(self.sound_style);
    }

    /// Fires every reminder due at `now`, then persists once if any fired.
    #[instrument(skip(self, now))]
    pub fn scan_reminders(&mut self, now: DateTime<Utc>) -> anyhow::Result<Vec<Task>> {
        let mut tasks = self.store.load();
        let due = due_reminders(&tasks, now, &self.policy);
        if due.is_empty() {
            return Ok(vec![]);
        }

        let stamp = now.timestamp_millis();
        let mut fired = Vec::with_capacity(due.len());
        for idx in due {
            let task = &mut tasks[idx];
            task.reminded_at = Some(stamp);
            fired.push(task.clone());
        }

        for task in &fired {
            info!(id = %task.id, title = %task.title, "reminder fired");
            self.notify_reminder(task);
        }

        self.store.save(&tasks)?;
        Ok(fired)
    }

    fn notify_reminder(&self, task: &Task) {
        self.notifier.toast(&format!("🔔 Rappel : {}", task.title));
        self.notifier.play(self.sound_style);
    }
}
