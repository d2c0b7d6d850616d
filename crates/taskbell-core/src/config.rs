use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace
};

use crate::notify::SoundStyle;
use crate::reminder::ReminderPolicy;
use crate::store::DEFAULT_STORAGE_KEY;

const RC_ENV_VAR: &str = "TASKBELLRC";
const RC_FILE_NAME: &str =
  ".taskbellrc";
const RC_DISABLED: &str = "/dev/null";
const DEFAULT_DATA_DIR: &str =
  "~/.taskbell";

const DEFAULTS: [(&str, &str); 7] = [
  ("data.location", DEFAULT_DATA_DIR),
  (
    "storage.key",
    DEFAULT_STORAGE_KEY
  ),
  ("reminder.interval", "15000"),
  ("reminder.grace", "120000"),
  ("notify.enabled", "on"),
  ("notify.style", "beep"),
  ("color", "on")
];

/// Flat `key = value` settings. Later
/// sources win: defaults, the rc file,
/// then `--rc` overrides.
#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub source: Option<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      map: DEFAULTS
        .iter()
        .map(|(k, v)| {
          (k.to_string(), v.to_string())
        })
        .collect(),
      source: None
    }
  }
}

/// Where the rc file comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RcSource {
  File(PathBuf),
  Disabled,
  Absent
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    match locate_rc(rc_override) {
      | RcSource::File(path) => {
        info!(rc = %path.display(), "reading taskbellrc");
        cfg.merge_file(&path)?;
      }
      | RcSource::Disabled => {
        debug!(
          "taskbellrc disabled; using \
           defaults"
        );
      }
      | RcSource::Absent => {
        debug!(
          "no taskbellrc; using \
           defaults"
        );
      }
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (key, value) in overrides {
      debug!(key = %key, value = %value, "override");
      self.map.insert(key, value);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  /// `None` when unset; an error when
  /// the value is not an on/off word.
  pub fn switch(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    let Some(raw) = self.map.get(key)
    else {
      return Ok(None);
    };
    parse_switch(raw)
      .map(Some)
      .ok_or_else(|| {
        anyhow!(
          "invalid {key} (expected \
           on/off): {raw}"
        )
      })
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  pub fn storage_key(&self) -> String {
    self
      .get("storage.key")
      .map(|k| k.trim().to_string())
      .filter(|k| !k.is_empty())
      .unwrap_or_else(|| {
        DEFAULT_STORAGE_KEY.to_string()
      })
  }

  pub fn scan_interval(
    &self
  ) -> anyhow::Result<Duration> {
    let interval =
      self.millis("reminder.interval")?;
    if interval.is_zero() {
      return Err(anyhow!(
        "reminder.interval must be \
         greater than zero"
      ));
    }
    Ok(interval)
  }

  pub fn reminder_policy(
    &self
  ) -> anyhow::Result<ReminderPolicy> {
    Ok(ReminderPolicy {
      grace: self
        .millis("reminder.grace")?
    })
  }

  pub fn sound_enabled(
    &self
  ) -> anyhow::Result<bool> {
    Ok(
      self
        .switch("notify.enabled")?
        .unwrap_or(true)
    )
  }

  pub fn sound_style(
    &self
  ) -> anyhow::Result<SoundStyle> {
    let raw = self
      .get("notify.style")
      .unwrap_or_default();
    raw.parse::<SoundStyle>().with_context(|| {
      format!(
        "invalid notify.style: {raw}"
      )
    })
  }

  fn millis(
    &self,
    key: &str
  ) -> anyhow::Result<Duration> {
    let raw = self
      .map
      .get(key)
      .ok_or_else(|| {
        anyhow!("missing {key}")
      })?;
    raw
      .trim()
      .parse::<u64>()
      .map(Duration::from_millis)
      .with_context(|| {
        format!(
          "invalid {key} (expected \
           milliseconds): {raw}"
        )
      })
  }

  #[tracing::instrument(skip(self))]
  fn merge_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let text = fs::read_to_string(path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;

    for (idx, line) in
      text.lines().enumerate()
    {
      let entry = parse_rc_line(line)
        .with_context(|| {
          format!(
            "{}:{}",
            path.display(),
            idx + 1
          )
        })?;
      if let Some((key, value)) = entry
      {
        trace!(key, value, "rc entry");
        self.map.insert(
          key.to_string(),
          value.to_string()
        );
      }
    }

    self.source =
      Some(path.to_path_buf());
    Ok(())
  }
}

/// One rc line: blank, a `#` comment,
/// or `key = value` with an optional
/// trailing comment.
fn parse_rc_line(
  line: &str
) -> anyhow::Result<Option<(&str, &str)>>
{
  let body = line
    .split_once('#')
    .map_or(line, |(before, _)| before)
    .trim();
  if body.is_empty() {
    return Ok(None);
  }

  let (key, value) = body
    .split_once('=')
    .ok_or_else(|| {
      anyhow!(
        "expected key = value, got: \
         {body}"
      )
    })?;
  let key = key.trim();
  if key.is_empty() {
    return Err(anyhow!(
      "missing key before '='"
    ));
  }
  Ok(Some((key, value.trim())))
}

fn locate_rc(
  rc_override: Option<&Path>
) -> RcSource {
  let explicit = rc_override
    .map(Path::to_path_buf)
    .or_else(|| {
      std::env::var_os(RC_ENV_VAR)
        .map(PathBuf::from)
    });

  match explicit {
    | Some(path)
      if path == Path::new(RC_DISABLED) =>
    {
      RcSource::Disabled
    }
    | Some(path) => {
      RcSource::File(expand_home(
        &path.to_string_lossy()
      ))
    }
    | None => {
      dirs::home_dir()
        .map(|home| {
          home.join(RC_FILE_NAME)
        })
        .filter(|p| p.is_file())
        .map_or(
          RcSource::Absent,
          RcSource::File
        )
    }
  }
}

/// `--data` wins over `data.location`.
/// The directory is created if missing.
#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = match override_dir {
    | Some(path) => path.to_path_buf(),
    | None => expand_home(
      &cfg
        .get("data.location")
        .unwrap_or_else(|| {
          DEFAULT_DATA_DIR.to_string()
        })
    )
  };

  fs::create_dir_all(&dir)
    .with_context(|| {
      format!(
        "failed to create {}",
        dir.display()
      )
    })?;
  Ok(dir)
}

fn expand_home(raw: &str) -> PathBuf {
  let rest = match raw {
    | "~" => Some(""),
    | _ => raw.strip_prefix("~/")
  };
  match (rest, dirs::home_dir()) {
    | (Some(rest), Some(home)) => {
      home.join(rest)
    }
    | _ => PathBuf::from(raw)
  }
}

fn parse_switch(
  raw: &str
) -> Option<bool> {
  match raw
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}
