pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod notify;
pub mod reminder;
pub mod render;
pub mod store;
pub mod task;
pub mod view;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting taskbell"
  );
  debug!(?cli.rc_overrides, "rc overrides");

  let mut cfg = config::Config::load(
    cli.taskbellrc.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .rc_overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let backend =
    store::FileKeyValueStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open task storage \
         at {}",
        data_dir.display()
      )
    })?;
  let task_store = store::TaskStore::new(
    backend,
    cfg.storage_key()
  );

  let notifier =
    notify::TerminalNotifier::new(
      cfg.sound_enabled()?
    );
  let bell = app::TaskBell::new(
    task_store,
    Box::new(notifier)
  )
  .with_policy(cfg.reminder_policy()?)
  .with_sound_style(
    cfg.sound_style()?
  );

  let mut renderer =
    render::Renderer::new(&cfg)?;
  let command = cli
    .command
    .unwrap_or_else(|| {
      cli::Command::List(
        cli::ListArgs::default_view()
      )
    });

  commands::dispatch(
    bell,
    &cfg,
    &mut renderer,
    command
  )?;

  info!("done");
  Ok(())
}
