use std::sync::OnceLock;

use chrono::{
  DateTime,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  TimeZone,
  Utc
};
use chrono_tz::Tz;
use serde::{
  Deserialize,
  Deserializer
};
use serde_json::Value;
use tracing::warn;

const TIMEZONE_ENV_VAR: &str =
  "TASKBELL_TIMEZONE";

const NAIVE_FORMATS: [&str; 3] = [
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%dT%H:%M",
  "%Y-%m-%d %H:%M"
];

/// Zone used for due dates written
/// without an offset and for display.
pub fn display_timezone() -> &'static Tz
{
  static DISPLAY_TZ: OnceLock<Tz> =
    OnceLock::new();
  DISPLAY_TZ.get_or_init(
    resolve_display_timezone
  )
}

fn resolve_display_timezone() -> Tz {
  let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
  else {
    return Tz::UTC;
  };

  match raw.trim().parse::<Tz>() {
    | Ok(tz) => tz,
    | Err(err) => {
      warn!(
        value = %raw,
        error = %err,
        "invalid timezone; using UTC"
      );
      Tz::UTC
    }
  }
}

/// Parses a stored due value. RFC 3339
/// instants are taken as-is; the
/// offset-less forms produced by date
/// pickers are read in the display
/// zone. Anything else is "no
/// deadline".
pub fn parse_due(
  raw: &str
) -> Option<DateTime<Utc>> {
  parse_due_in(
    raw,
    display_timezone()
  )
}

pub fn parse_due_in(
  raw: &str,
  tz: &Tz
) -> Option<DateTime<Utc>> {
  let raw = raw.trim();
  if raw.is_empty() {
    return None;
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(raw)
  {
    return Some(
      dt.with_timezone(&Utc)
    );
  }

  let naive = NAIVE_FORMATS
    .iter()
    .find_map(|fmt| {
      NaiveDateTime::parse_from_str(
        raw, fmt
      )
      .ok()
    })
    .or_else(|| {
      NaiveDate::parse_from_str(
        raw, "%Y-%m-%d"
      )
      .ok()
      .and_then(|d| {
        d.and_hms_opt(0, 0, 0)
      })
    })?;

  match tz.from_local_datetime(&naive)
  {
    | LocalResult::Single(dt) => {
      Some(dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      earliest,
      _
    ) => {
      Some(
        earliest.with_timezone(&Utc)
      )
    }
    | LocalResult::None => None
  }
}

#[must_use]
pub fn format_due(
  raw: Option<&str>
) -> String {
  raw
    .and_then(parse_due)
    .map(|dt| {
      dt.with_timezone(
        display_timezone()
      )
      .format("%Y-%m-%d %H:%M")
      .to_string()
    })
    .unwrap_or_else(|| {
      "Sans échéance".to_string()
    })
}

pub fn from_millis(
  ms: i64
) -> Option<DateTime<Utc>> {
  Utc.timestamp_millis_opt(ms).single()
}

/// `""` and `null` both mean "not
/// set".
pub fn blank_as_none<'de, D>(
  deserializer: D
) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>
{
  let opt =
    Option::<String>::deserialize(
      deserializer
    )?;
  Ok(opt.filter(|s| {
    !s.trim().is_empty()
  }))
}

/// Reminder lead time as written by
/// form inputs: a number, a numeric
/// string, or nothing.
pub fn lenient_minutes<'de, D>(
  deserializer: D
) -> Result<u32, D::Error>
where
  D: Deserializer<'de>
{
  let value =
    Option::<Value>::deserialize(
      deserializer
    )?;
  let minutes = match value {
    | Some(Value::Number(n)) => {
      n.as_u64().or_else(|| {
        n.as_f64()
          .filter(|f| {
            f.is_finite() && *f > 0.0
          })
          .map(|f| f as u64)
      })
    }
    | Some(Value::String(s)) => {
      s.trim().parse::<u64>().ok()
    }
    | _ => None
  };

  Ok(
    minutes
      .map(|m| {
        u32::try_from(m)
          .unwrap_or(u32::MAX)
      })
      .unwrap_or(0)
  )
}
