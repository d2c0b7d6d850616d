use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::task::{Status, Task, priority_rank};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    CreatedAsc,
    #[default]
    CreatedDesc,
    DueAsc,
    DueDesc,
    PriorityDesc,
}

impl SortKey {
    /// Unknown keys fall back to newest-first.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreatedAsc => "created_asc",
            Self::CreatedDesc => "created_desc",
            Self::DueAsc => "due_asc",
            Self::DueDesc => "due_desc",
            Self::PriorityDesc => "priority_desc",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created_asc" => Ok(Self::CreatedAsc),
            "created_desc" => Ok(Self::CreatedDesc),
            "due_asc" => Ok(Self::DueAsc),
            "due_desc" => Ok(Self::DueDesc),
            "priority_desc" => Ok(Self::PriorityDesc),
            other => Err(anyhow::anyhow!("unknown sort key: {other}")),
        }
    }
}

/// `None` means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pub status: Option<Status>,
    pub priority: Option<String>,
    pub category: Option<String>,
}

impl Filters {
    pub fn set_status(&mut self, raw: &str) -> anyhow::Result<()> {
        self.status = match all_or_value(raw) {
            Some(value) => Some(value.parse()?),
            None => None,
        };
        Ok(())
    }

    pub fn set_priority(&mut self, raw: &str) {
        self.priority = all_or_value(raw).map(ToString::to_string);
    }

    pub fn set_category(&mut self, raw: &str) {
        self.category = all_or_value(raw).map(ToString::to_string);
    }

    fn matches(&self, task: &Task) -> bool {
        if let Some(status) = self.status
            && task.status() != status
        {
            return false;
        }

        if let Some(priority) = self.priority.as_deref()
            && task.priority != priority
        {
            return false;
        }

        if let Some(category) = self.category.as_deref()
            && task.category != category
        {
            return false;
        }

        true
    }
}

fn all_or_value(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
        None
    } else {
        Some(trimmed)
    }
}

/// Session-local toolbar state. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub selected_id: Option<String>,
    pub filters: Filters,
    pub search: String,
    pub sort: SortKey,
}

impl ViewState {
    pub fn is_selected(&self, task: &Task) -> bool {
        self.selected_id.as_deref() == Some(task.id.as_str())
    }
}

/// Filter, search and sort a snapshot for display. The input is untouched.
#[tracing::instrument(skip_all, fields(count = tasks.len(), sort = %view.sort))]
pub fn apply_view(tasks: &[Task], view: &ViewState) -> Vec<Task> {
    let query = view.search.trim().to_lowercase();

    let mut out: Vec<Task> = tasks
        .iter()
        .cloned()
        .map(|mut task| {
            task.normalize();
            task
        })
        .filter(|task| view.filters.matches(task))
        .filter(|task| query.is_empty() || task.haystack().contains(&query))
        .collect();

    // slice::sort_by is stable, ties keep input order.
    match view.sort {
        SortKey::CreatedAsc => out.sort_by_key(|t| t.created_at),
        SortKey::CreatedDesc => out.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortKey::DueAsc => out.sort_by(|a, b| DueKey::of(a).cmp(&DueKey::of(b))),
        SortKey::DueDesc => out.sort_by(|a, b| DueKey::of(b).cmp(&DueKey::of(a))),
        SortKey::PriorityDesc => {
            out.sort_by(|a, b| priority_rank(&b.priority).cmp(&priority_rank(&a.priority)))
        }
    }

    debug!(visible = out.len(), "applied view");
    trace!(ids = ?out.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), "view order");
    out
}

/// Due instant with "no deadline" ordered after every real date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DueKey {
    At(DateTime<Utc>),
    Never,
}

impl DueKey {
    fn of(task: &Task) -> Self {
        task.due_at().map_or(Self::Never, Self::At)
    }
}

impl Ord for DueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::At(a), Self::At(b)) => a.cmp(b),
            (Self::At(_), Self::Never) => Ordering::Less,
            (Self::Never, Self::At(_)) => Ordering::Greater,
            (Self::Never, Self::Never) => Ordering::Equal,
        }
    }
}

impl PartialOrd for DueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub total: usize,
    pub done: usize,
    pub pending: usize,
    pub todo: usize,
    pub percent: u8,
}

impl Progress {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let total = tasks.len();
        let done = tasks.iter().filter(|t| t.status() == Status::Done).count();
        let pending = tasks.iter().filter(|t| t.status() == Status::Pending).count();
        let percent = if total == 0 {
            0
        } else {
            ((done as f64 / total as f64) * 100.0).round() as u8
        };

        Self {
            total,
            done,
            pending,
            todo: total - done - pending,
            percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn task(title: &str, created_at: i64) -> Task {
        let now = Utc.with_ymd_and_hms(2026, 2, 16, 5, 0, 0).unwrap();
        let mut task = Task::new_todo(title.to_string(), now);
        task.created_at = created_at;
        task
    }

    fn titles(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.title.as_str()).collect()
    }

    #[test]
    fn created_desc_orders_newest_first() {
        let tasks = vec![task("a", 100), task("b", 300), task("c", 200)];
        let view = ViewState::default();
        let out = apply_view(&tasks, &view);
        let created: Vec<i64> = out.iter().map(|t| t.created_at).collect();
        assert_eq!(created, vec![300, 200, 100]);
    }

    #[test]
    fn due_asc_puts_undated_last_in_input_order() {
        let mut tasks = vec![task("first", 1), task("dated", 2), task("third", 3)];
        tasks[1].due = Some("2025-01-01T00:00:00Z".to_string());
        let view = ViewState {
            sort: SortKey::DueAsc,
            ..ViewState::default()
        };
        assert_eq!(titles(&apply_view(&tasks, &view)), vec!["dated", "first", "third"]);
    }

    #[test]
    fn unparseable_due_sorts_as_no_deadline() {
        let mut tasks = vec![task("garbage", 1), task("later", 2), task("sooner", 3)];
        tasks[0].due = Some("someday".to_string());
        tasks[1].due = Some("2026-06-01T00:00:00Z".to_string());
        tasks[2].due = Some("2026-01-01T00:00:00Z".to_string());

        let asc = ViewState {
            sort: SortKey::DueAsc,
            ..ViewState::default()
        };
        assert_eq!(titles(&apply_view(&tasks, &asc)), vec!["sooner", "later", "garbage"]);

        let desc = ViewState {
            sort: SortKey::DueDesc,
            ..ViewState::default()
        };
        assert_eq!(titles(&apply_view(&tasks, &desc)), vec!["garbage", "later", "sooner"]);
    }

    #[test]
    fn priority_desc_is_stable() {
        let mut tasks = vec![task("n1", 1), task("u", 2), task("n2", 3), task("odd", 4)];
        tasks[1].priority = "Urgente".to_string();
        tasks[3].priority = "Meh".to_string();
        let view = ViewState {
            sort: SortKey::PriorityDesc,
            ..ViewState::default()
        };
        assert_eq!(titles(&apply_view(&tasks, &view)), vec!["u", "n1", "n2", "odd"]);
    }

    #[test]
    fn filter_then_search() {
        let mut milk = task("Buy milk", 1);
        milk.category = "Admin".to_string();
        let report = task("Write report", 2);

        let mut view = ViewState::default();
        view.filters.set_category("Études");
        view.search = "  REPORT ".to_string();

        let out = apply_view(&[milk, report], &view);
        assert_eq!(titles(&out), vec!["Write report"]);
    }

    #[test]
    fn search_covers_note_and_tags() {
        let mut noted = task("a", 1);
        noted.note = "Call the Bank".to_string();
        let mut tagged = task("b", 2);
        tagged.tags = vec!["Unistra".to_string()];

        let mut view = ViewState::default();
        view.search = "bank".to_string();
        assert_eq!(titles(&apply_view(&[noted.clone(), tagged.clone()], &view)), vec!["a"]);

        view.search = "unistra".to_string();
        assert_eq!(titles(&apply_view(&[noted, tagged], &view)), vec!["b"]);
    }

    #[test]
    fn status_filter_sees_legacy_records() {
        let mut legacy = task("legacy", 1);
        legacy.status = None;
        legacy.done = true;
        let open = task("open", 2);

        let mut view = ViewState::default();
        view.filters.set_status("done").unwrap();
        let out = apply_view(&[legacy.clone(), open], &view);
        assert_eq!(titles(&out), vec!["legacy"]);
        assert_eq!(out[0].status, Some(Status::Done));
        assert_eq!(legacy.status, None);

        view.filters.set_status("all").unwrap();
        assert_eq!(view.filters.status, None);
        assert!(view.filters.set_status("sometime").is_err());
    }

    #[test]
    fn unknown_sort_falls_back_to_created_desc() {
        assert_eq!(SortKey::parse_lenient("alphabetical"), SortKey::CreatedDesc);
        assert_eq!(SortKey::parse_lenient("due_asc"), SortKey::DueAsc);
    }

    #[test]
    fn progress_counts() {
        assert_eq!(Progress::from_tasks(&[]), Progress::default());

        let mut tasks = vec![task("a", 1), task("b", 2), task("c", 3)];
        tasks[0].set_done(true);
        tasks[1].cycle_status();
        let progress = Progress::from_tasks(&tasks);
        assert_eq!(progress.total, 3);
        assert_eq!(progress.done, 1);
        assert_eq!(progress.pending, 1);
        assert_eq!(progress.todo, 1);
        assert_eq!(progress.percent, 33);
    }
}
