use std::collections::BTreeMap;

use anyhow::anyhow;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::app::{TaskBell, TaskDraft};
use crate::cli::{AddArgs, Command, ListArgs};
use crate::config::Config;
use crate::reminder::ReminderDriver;
use crate::render::Renderer;
use crate::store::KeyValueStore;
use crate::view::SortKey;

#[instrument(skip(bell, cfg, renderer, command))]
pub fn dispatch<S>(
    mut bell: TaskBell<S>,
    cfg: &Config,
    renderer: &mut Renderer,
    command: Command,
) -> anyhow::Result<()>
where
    S: KeyValueStore + Send + 'static,
{
    debug!(?command, "dispatching command");

    match command {
        Command::Add(args) => cmd_add(&mut bell, args),
        Command::List(args) => cmd_list(&mut bell, renderer, args),
        Command::Show { id } => cmd_show(&mut bell, renderer, &id),
        Command::Cycle { id } => cmd_cycle(&mut bell, &id),
        Command::Done { id } => cmd_toggle(&mut bell, &id, true),
        Command::Undone { id } => cmd_toggle(&mut bell, &id, false),
        Command::Delete { id } => cmd_delete(&mut bell, &id),
        Command::Clear => bell.clear_all(),
        Command::ClearDone => {
            let removed = bell.clear_completed()?;
            println!("Removed {removed} done task(s).");
            Ok(())
        }
        Command::Demo => {
            for task in bell.seed_demo(Utc::now())? {
                println!("Created task {}.", task.id);
            }
            Ok(())
        }
        Command::Remind { id } => cmd_remind(&bell, &id),
        Command::Stats => renderer.print_progress(&bell.progress()),
        Command::TestNotify => {
            bell.test_notification();
            Ok(())
        }
        Command::PreviewSound => {
            bell.preview_sound();
            Ok(())
        }
        Command::Scan => {
            let fired = bell.scan_reminders(Utc::now())?;
            println!("{} reminder(s) fired.", fired.len());
            Ok(())
        }
        Command::Watch => cmd_watch(bell, cfg),
        Command::Config => cmd_config(cfg),
    }
}

/// Accepts a full id or a unique prefix of one. Unknown ids resolve to
/// `None`; a prefix shared by several tasks is an error.
pub fn resolve_id<S: KeyValueStore>(bell: &TaskBell<S>, token: &str) -> anyhow::Result<Option<String>> {
    let token = token.trim();
    if token.is_empty() {
        return Ok(None);
    }

    let tasks = bell.tasks();
    if tasks.iter().any(|task| task.id == token) {
        return Ok(Some(token.to_string()));
    }

    let mut matches = tasks.iter().filter(|task| task.id.starts_with(token));
    let Some(first) = matches.next() else {
        return Ok(None);
    };
    if matches.next().is_some() {
        return Err(anyhow!("ambiguous task id prefix: {token}"));
    }
    Ok(Some(first.id.clone()))
}

fn resolve_or_report<S: KeyValueStore>(bell: &TaskBell<S>, token: &str) -> anyhow::Result<Option<String>> {
    let resolved = resolve_id(bell, token)?;
    if resolved.is_none() {
        warn!(id = %token, "no such task");
        println!("No task matches {token}.");
    }
    Ok(resolved)
}

#[instrument(skip(bell, args))]
fn cmd_add<S: KeyValueStore>(bell: &mut TaskBell<S>, args: AddArgs) -> anyhow::Result<()> {
    info!("command add");

    let draft = TaskDraft {
        title: args.title.join(" "),
        category: args.category,
        priority: args.priority,
        due: args.due,
        tags: args.tags,
        reminder_min: args.reminder_min,
        note: args.note,
        subtasks: args.subtasks.join("\n"),
    };

    if let Some(task) = bell.create(draft, Utc::now())? {
        if task.due.is_some() && task.due_at().is_none() {
            warn!(due = ?task.due, "due date not understood; treated as no deadline");
        }
        println!("Created task {}.", task.id);
    }
    Ok(())
}

#[instrument(skip(bell, renderer, args))]
fn cmd_list<S: KeyValueStore>(
    bell: &mut TaskBell<S>,
    renderer: &mut Renderer,
    args: ListArgs,
) -> anyhow::Result<()> {
    bell.view.filters.set_status(&args.status)?;
    bell.view.filters.set_priority(&args.priority);
    bell.view.filters.set_category(&args.category);
    bell.view.search = args.search;
    bell.view.sort = SortKey::parse_lenient(&args.sort);

    if let Some(token) = args.select
        && let Some(id) = resolve_or_report(bell, &token)?
    {
        bell.select(&id);
    }

    let visible = bell.visible();
    renderer.print_task_table(&visible, &bell.view, Utc::now())?;
    println!();
    renderer.print_progress(&bell.progress())
}

#[instrument(skip(bell, renderer))]
fn cmd_show<S: KeyValueStore>(bell: &mut TaskBell<S>, renderer: &mut Renderer, token: &str) -> anyhow::Result<()> {
    let Some(id) = resolve_or_report(bell, token)? else {
        return Ok(());
    };
    match bell.select(&id) {
        Some(task) => renderer.print_task_info(&task),
        None => Ok(()),
    }
}

#[instrument(skip(bell))]
fn cmd_cycle<S: KeyValueStore>(bell: &mut TaskBell<S>, token: &str) -> anyhow::Result<()> {
    let Some(id) = resolve_or_report(bell, token)? else {
        return Ok(());
    };
    if let Some(status) = bell.cycle_status(&id)? {
        println!("Task {id} is now {status}.");
    }
    Ok(())
}

#[instrument(skip(bell))]
fn cmd_toggle<S: KeyValueStore>(bell: &mut TaskBell<S>, token: &str, checked: bool) -> anyhow::Result<()> {
    let Some(id) = resolve_or_report(bell, token)? else {
        return Ok(());
    };
    if let Some(status) = bell.toggle_done(&id, checked)? {
        println!("Task {id} is now {status}.");
    }
    Ok(())
}

#[instrument(skip(bell))]
fn cmd_delete<S: KeyValueStore>(bell: &mut TaskBell<S>, token: &str) -> anyhow::Result<()> {
    let Some(id) = resolve_or_report(bell, token)? else {
        return Ok(());
    };
    if bell.delete(&id)? {
        println!("Deleted task {id}.");
    }
    Ok(())
}

#[instrument(skip(bell))]
fn cmd_remind<S: KeyValueStore>(bell: &TaskBell<S>, token: &str) -> anyhow::Result<()> {
    if let Some(id) = resolve_or_report(bell, token)? {
        bell.remind_now(&id);
    }
    Ok(())
}

#[instrument(skip(bell, cfg))]
fn cmd_watch<S>(bell: TaskBell<S>, cfg: &Config) -> anyhow::Result<()>
where
    S: KeyValueStore + Send + 'static,
{
    let interval = cfg.scan_interval()?;
    let shared = bell.into_shared();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let mut driver = ReminderDriver::start(shared, interval);
        println!(
            "Watching for reminders every {}s. Press Ctrl-C to stop.",
            interval.as_secs_f64()
        );
        wait_for_shutdown_signal().await;
        driver.stop();
    });

    info!("watch stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(error) => {
            warn!(%error, "failed to register SIGTERM handler; falling back to ctrl_c");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed waiting for ctrl_c signal");
    }
}

fn cmd_config(cfg: &Config) -> anyhow::Result<()> {
    if let Some(source) = &cfg.source {
        println!("# {}", source.display());
    }
    let sorted: BTreeMap<&String, &String> = cfg.iter().collect();
    for (key, value) in sorted {
        println!("{key}={value}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::resolve_id;
    use crate::app::{TaskBell, TaskDraft};
    use crate::notify::RecordingNotifier;
    use crate::store::{MemoryKeyValueStore, TaskStore};
    use crate::task::Task;

    #[test]
    fn resolves_unique_prefixes() {
        let store = TaskStore::new(MemoryKeyValueStore::new(), "tasks");
        let mut alpha = Task::new_todo("alpha".to_string(), Utc::now());
        alpha.id = "abc-111".to_string();
        let mut beta = Task::new_todo("beta".to_string(), Utc::now());
        beta.id = "abd-222".to_string();
        store.save(&[alpha, beta]).unwrap();
        let bell = TaskBell::new(store, Box::new(RecordingNotifier::new()));

        assert_eq!(resolve_id(&bell, "abc").unwrap().as_deref(), Some("abc-111"));
        assert_eq!(resolve_id(&bell, "abd-222").unwrap().as_deref(), Some("abd-222"));
        assert!(resolve_id(&bell, "ab").is_err());
        assert_eq!(resolve_id(&bell, "zzz").unwrap(), None);
        assert_eq!(resolve_id(&bell, " ").unwrap(), None);
    }

    #[test]
    fn created_ids_resolve_by_short_prefix() {
        let store = TaskStore::new(MemoryKeyValueStore::new(), "tasks");
        let mut bell = TaskBell::new(store, Box::new(RecordingNotifier::new()));
        let task = bell.create(TaskDraft::titled("one"), Utc::now()).unwrap().unwrap();
        assert_eq!(resolve_id(&bell, &task.id[..8]).unwrap(), Some(task.id));
    }
}
