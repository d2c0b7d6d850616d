use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Utc};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::{display_timezone, format_due, from_millis};
use crate::task::{Status, Task};
use crate::view::{Progress, ViewState};

const SHORT_ID_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.switch("color")?.unwrap_or(true);
        Ok(Self { color })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, tasks, view, now))]
    pub fn print_task_table(
        &mut self,
        tasks: &[Task],
        view: &ViewState,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_task_table(out, tasks, view, now)
    }

    pub fn write_task_table<W: Write>(
        &self,
        mut out: W,
        tasks: &[Task],
        view: &ViewState,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "Aucune tâche")?;
            writeln!(out, "Ajoute une tâche avec `taskbell add`, ou change les filtres.")?;
            return Ok(());
        }

        let headers = vec![
            String::new(),
            "ID".to_string(),
            "Status".to_string(),
            "Pri".to_string(),
            "Category".to_string(),
            "Due".to_string(),
            "Remind".to_string(),
            "Title".to_string(),
            "Tags".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());

        for task in tasks {
            let marker = if view.is_selected(task) { ">" } else { "" }.to_string();
            let id = self.paint(short_id(&task.id), "33");

            let status = task.status();
            let status_cell = match status {
                Status::Done => self.paint(status.label(), "35"),
                Status::Pending => self.paint(status.label(), "95"),
                Status::Todo => self.paint(status.label(), "34"),
            };

            let due = format_due(task.due.as_deref());
            let overdue = status != Status::Done && task.due_at().is_some_and(|due| due < now);
            let due = if overdue { self.paint(&due, "31") } else { due };

            let remind = if task.reminder_min > 0 {
                format!("-{} min", task.reminder_min)
            } else {
                String::new()
            };

            let tags = task
                .tags
                .iter()
                .map(|tag| format!("#{tag}"))
                .collect::<Vec<_>>()
                .join(" ");

            rows.push(vec![
                marker,
                id,
                status_cell,
                task.priority.clone(),
                task.category.clone(),
                due,
                remind,
                task.title.clone(),
                tags,
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task))]
    pub fn print_task_info(&mut self, task: &Task) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        write_task_info(out, task)
    }

    pub fn print_progress(&mut self, progress: &Progress) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(
            out,
            "total {}  todo {}  pending {}  done {}",
            progress.total, progress.todo, progress.pending, progress.done
        )?;
        writeln!(out, "{}", self.paint(&progress_bar(progress.percent), "32"))?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn short_id(id: &str) -> &str {
    id.char_indices()
        .nth(SHORT_ID_LEN)
        .map_or(id, |(idx, _)| &id[..idx])
}

fn progress_bar(percent: u8) -> String {
    let filled = usize::from(percent.min(100)) / 5;
    format!(
        "[{}{}] {percent}% terminé",
        "#".repeat(filled),
        "-".repeat(20 - filled)
    )
}

pub fn write_task_info<W: Write>(mut out: W, task: &Task) -> anyhow::Result<()> {
    writeln!(out, "id         {}", task.id)?;
    writeln!(out, "title      {}", task.title)?;
    writeln!(out, "status     {}", task.status().label())?;
    writeln!(out, "category   {}", task.category)?;
    writeln!(out, "priority   {}", task.priority)?;
    writeln!(out, "due        {}", format_due(task.due.as_deref()))?;
    if task.reminder_min > 0 {
        writeln!(out, "reminder   -{} min", task.reminder_min)?;
    } else {
        writeln!(out, "reminder   Aucun")?;
    }
    if let Some(reminded) = task.reminded_at.and_then(from_millis) {
        writeln!(
            out,
            "reminded   {}",
            reminded
                .with_timezone(display_timezone())
                .format("%Y-%m-%d %H:%M:%S")
        )?;
    }
    if let Some(created) = from_millis(task.created_at) {
        writeln!(
            out,
            "created    {}",
            created
                .with_timezone(display_timezone())
                .format("%Y-%m-%d %H:%M:%S")
        )?;
    }
    if !task.note.is_empty() {
        writeln!(out, "note       {}", task.note)?;
    }
    if !task.tags.is_empty() {
        let tags = task.tags.iter().map(|t| format!("#{t}")).collect::<Vec<_>>();
        writeln!(out, "tags       {}", tags.join(" "))?;
    }
    if !task.subtasks.is_empty() {
        writeln!(out, "subtasks")?;
        for subtask in &task.subtasks {
            writeln!(out, "  • {subtask}")?;
        }
    }

    Ok(())
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (idx, header) in headers.iter().enumerate() {
        write_padded(&mut writer, header, widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            write_padded(&mut writer, cell, widths[idx])?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn write_padded<W: Write>(writer: &mut W, cell: &str, width: usize) -> io::Result<()> {
    let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
    let padding = width.saturating_sub(visible_width);
    write!(writer, "{}{} ", cell, " ".repeat(padding))
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
