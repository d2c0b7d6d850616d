use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::builder::PossibleValuesParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::task::PRIORITIES;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskbell",
    version,
    about = "TaskBell: local task list with due-date reminders",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "taskbellrc", global = true)]
    pub taskbellrc: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Add a task.
    Add(AddArgs),
    /// List tasks through the filter/search/sort pipeline.
    List(ListArgs),
    /// Show one task in detail and select it.
    Show { id: String },
    /// Advance status: todo -> pending -> done -> todo.
    Cycle { id: String },
    /// Mark a task done.
    Done { id: String },
    /// Reopen a task as todo.
    Undone { id: String },
    /// Delete a task.
    Delete { id: String },
    /// Delete every task.
    Clear,
    /// Delete every done task.
    ClearDone,
    /// Add two sample tasks.
    Demo,
    /// Play the reminder for a task right now.
    Remind { id: String },
    /// Progress counts.
    Stats,
    /// Send a test notification.
    TestNotify,
    /// Play the configured reminder sound.
    PreviewSound,
    /// Run one reminder scan.
    Scan,
    /// Keep scanning for reminders until interrupted.
    Watch,
    /// Print the effective configuration.
    Config,
}

#[derive(Args, Debug, Clone, Default)]
pub struct AddArgs {
    #[arg(required = true, num_args = 1..)]
    pub title: Vec<String>,

    #[arg(short = 'c', long)]
    pub category: Option<String>,

    #[arg(short = 'p', long, value_parser = PossibleValuesParser::new(PRIORITIES))]
    pub priority: Option<String>,

    /// ISO-8601 instant or `YYYY-MM-DDTHH:MM` in the display timezone.
    #[arg(short = 'd', long)]
    pub due: Option<String>,

    /// Comma separated.
    #[arg(short = 't', long, default_value = "")]
    pub tags: String,

    /// Minutes before the due instant.
    #[arg(short = 'r', long = "remind", default_value_t = 0)]
    pub reminder_min: u32,

    #[arg(short = 'n', long, default_value = "")]
    pub note: String,

    #[arg(short = 's', long = "subtask", action = ArgAction::Append)]
    pub subtasks: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(long, default_value = "all")]
    pub status: String,

    #[arg(long, default_value = "all")]
    pub priority: String,

    #[arg(long, default_value = "all")]
    pub category: String,

    #[arg(long, default_value = "")]
    pub search: String,

    /// created_asc, created_desc, due_asc, due_desc or priority_desc.
    #[arg(long, default_value = "created_desc")]
    pub sort: String,

    /// Highlight a task in the listing.
    #[arg(long)]
    pub select: Option<String>,
}

impl ListArgs {
    /// What a bare `taskbell` shows.
    pub fn default_view() -> Self {
        Self {
            status: "all".to_string(),
            priority: "all".to_string(),
            category: "all".to_string(),
            search: String::new(),
            sort: "created_desc".to_string(),
            select: None,
        }
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
