use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::{blank_as_none, lenient_minutes, parse_due};

pub const DEFAULT_CATEGORY: &str = "Études";
pub const DEFAULT_PRIORITY: &str = "Normale";
pub const PRIORITIES: [&str; 4] = ["Basse", "Normale", "Haute", "Urgente"];

pub const MAX_TAGS: usize = 10;
pub const MAX_SUBTASKS: usize = 15;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Todo,
    Pending,
    Done,
}

impl Status {
    /// Successor in the `todo -> pending -> done -> todo` cycle.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Todo => Self::Pending,
            Self::Pending => Self::Done,
            Self::Done => Self::Todo,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Pending => "pending",
            Self::Done => "done",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Todo => "À faire",
            Self::Pending => "En attente",
            Self::Done => "Terminée",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "todo" => Ok(Self::Todo),
            "pending" => Ok(Self::Pending),
            "done" => Ok(Self::Done),
            other => Err(anyhow!("unknown status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default = "default_priority")]
    pub priority: String,

    #[serde(default, deserialize_with = "blank_as_none")]
    pub due: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default, deserialize_with = "lenient_minutes")]
    pub reminder_min: u32,

    #[serde(default)]
    pub note: String,

    #[serde(default)]
    pub subtasks: Vec<String>,

    #[serde(default)]
    pub done: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,

    #[serde(default)]
    pub created_at: i64,

    #[serde(default)]
    pub reminded_at: Option<i64>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn default_priority() -> String {
    DEFAULT_PRIORITY.to_string()
}

impl Task {
    pub fn new_todo(title: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            category: default_category(),
            priority: default_priority(),
            due: None,
            tags: vec![],
            reminder_min: 0,
            note: String::new(),
            subtasks: vec![],
            done: false,
            status: Some(Status::Todo),
            created_at: now.timestamp_millis(),
            reminded_at: None,
            extra: BTreeMap::new(),
        }
    }

    /// Upgrades legacy records that only carry `done` and keeps the flag in
    /// line with `todo`/`done`. `pending` leaves `done` untouched.
    pub fn normalize(&mut self) -> &mut Self {
        let status = *self.status.get_or_insert(if self.done {
            Status::Done
        } else {
            Status::Todo
        });
        match status {
            Status::Done => self.done = true,
            Status::Todo => self.done = false,
            Status::Pending => {}
        }
        self
    }

    pub fn status(&self) -> Status {
        self.status.unwrap_or(if self.done {
            Status::Done
        } else {
            Status::Todo
        })
    }

    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        self.due.as_deref().and_then(parse_due)
    }

    pub fn has_reminder(&self) -> bool {
        self.reminder_min > 0 && self.due.is_some()
    }

    pub fn cycle_status(&mut self) -> Status {
        let next = self.normalize().status().next();
        self.status = Some(next);
        self.done = next == Status::Done;
        self.rearm_reminder();
        next
    }

    /// Checkbox shortcut: can only land on `todo` or `done`.
    pub fn set_done(&mut self, checked: bool) {
        self.done = checked;
        self.status = Some(if checked { Status::Done } else { Status::Todo });
        self.rearm_reminder();
    }

    fn rearm_reminder(&mut self) {
        if !self.done && self.has_reminder() {
            self.reminded_at = None;
        }
    }

    pub fn haystack(&self) -> String {
        let mut parts = Vec::with_capacity(self.tags.len() + 2);
        parts.push(self.title.as_str());
        parts.push(self.note.as_str());
        parts.extend(self.tags.iter().map(String::as_str));
        parts.join(" ").to_lowercase()
    }
}

pub fn priority_rank(priority: &str) -> u8 {
    match priority {
        "Urgente" => 4,
        "Haute" => 3,
        "Normale" => 2,
        "Basse" => 1,
        _ => 0,
    }
}

pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .take(MAX_TAGS)
        .map(ToString::to_string)
        .collect()
}

pub fn parse_subtasks(input: &str) -> Vec<String> {
    input
        .lines()
        .map(strip_bullet)
        .filter(|line| !line.is_empty())
        .take(MAX_SUBTASKS)
        .map(ToString::to_string)
        .collect()
}

fn strip_bullet(line: &str) -> &str {
    line.trim_start_matches('-').trim()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn legacy(done: bool) -> Task {
        let mut task = Task::new_todo("legacy".to_string(), Utc::now());
        task.status = None;
        task.done = done;
        task
    }

    #[test]
    fn normalize_derives_status_from_done() {
        let mut finished = legacy(true);
        finished.normalize();
        assert_eq!(finished.status, Some(Status::Done));
        assert!(finished.done);

        let mut open = legacy(false);
        open.normalize();
        assert_eq!(open.status, Some(Status::Todo));
        assert!(!open.done);
    }

    #[test]
    fn normalize_is_idempotent_and_consistent() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let mut samples = vec![legacy(true), legacy(false)];
        for (status, done) in [
            (Status::Todo, true),
            (Status::Done, false),
            (Status::Pending, false),
            (Status::Pending, true),
        ] {
            let mut task = Task::new_todo("x".to_string(), now);
            task.status = Some(status);
            task.done = done;
            samples.push(task);
        }

        for mut task in samples {
            task.normalize();
            let once = task.clone();
            task.normalize();
            assert_eq!(task, once);

            match task.status() {
                Status::Done => assert!(task.done),
                Status::Todo => assert!(!task.done),
                Status::Pending => {}
            }
        }
    }

    #[test]
    fn cycle_returns_to_todo_after_three_steps() {
        let mut task = Task::new_todo("cycle".to_string(), Utc::now());
        let mut seen = vec![];
        for _ in 0..3 {
            let status = task.cycle_status();
            assert_eq!(task.done, status == Status::Done);
            seen.push(status);
        }
        assert_eq!(seen, vec![Status::Pending, Status::Done, Status::Todo]);
        assert_eq!(task.status(), Status::Todo);
    }

    #[test]
    fn leaving_done_rearms_reminder() {
        let mut task = Task::new_todo("remind".to_string(), Utc::now());
        task.due = Some("2026-03-01T10:00:00Z".to_string());
        task.reminder_min = 5;
        task.reminded_at = Some(42);

        task.set_done(true);
        assert_eq!(task.reminded_at, Some(42));

        task.set_done(false);
        assert_eq!(task.reminded_at, None);
        assert_eq!(task.status(), Status::Todo);
    }

    #[test]
    fn reminder_stays_set_without_reminder_config() {
        let mut task = Task::new_todo("plain".to_string(), Utc::now());
        task.reminded_at = Some(7);
        task.cycle_status();
        assert_eq!(task.reminded_at, Some(7));
    }

    #[test]
    fn tags_are_trimmed_and_truncated() {
        let tags = parse_tags("a,b,c,d,e,f,g,h,i,j,k,l");
        assert_eq!(tags.len(), MAX_TAGS);
        assert_eq!(tags.first().map(String::as_str), Some("a"));
        assert_eq!(tags.last().map(String::as_str), Some("j"));

        assert_eq!(parse_tags(" x , ,y,"), vec!["x", "y"]);
        assert!(parse_tags("").is_empty());
    }

    #[test]
    fn subtasks_strip_bullets() {
        let subtasks = parse_subtasks("- relire\n--tester\n\n  publier  \n-");
        assert_eq!(subtasks, vec!["relire", "tester", "publier"]);

        let many = (0..20).map(|i| format!("- step {i}")).collect::<Vec<_>>().join("\n");
        assert_eq!(parse_subtasks(&many).len(), MAX_SUBTASKS);
    }

    #[test]
    fn priority_ranks() {
        assert!(priority_rank("Urgente") > priority_rank("Haute"));
        assert!(priority_rank("Haute") > priority_rank("Normale"));
        assert!(priority_rank("Normale") > priority_rank("Basse"));
        assert_eq!(priority_rank("whatever"), 0);
    }

    #[test]
    fn status_parses_from_text() {
        assert_eq!("Pending".parse::<Status>().unwrap(), Status::Pending);
        assert!("later".parse::<Status>().is_err());
    }
}
