use std::fmt;
use std::io::{self, IsTerminal, Write};
use std::str::FromStr;

use anyhow::anyhow;
use parking_lot::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoundStyle {
    #[default]
    Beep,
    Chime,
    Soft,
}

impl SoundStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beep => "beep",
            Self::Chime => "chime",
            Self::Soft => "soft",
        }
    }

    /// Terminal bells standing in for the tone of each style.
    fn bells(self) -> usize {
        match self {
            Self::Beep => 1,
            Self::Chime => 2,
            Self::Soft => 1,
        }
    }
}

impl fmt::Display for SoundStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SoundStyle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beep" => Ok(Self::Beep),
            "chime" => Ok(Self::Chime),
            "soft" => Ok(Self::Soft),
            other => Err(anyhow!("unknown sound style: {other}")),
        }
    }
}

/// Fire-and-forget user feedback: a transient message and a sound.
pub trait Notifier: Send {
    fn toast(&self, message: &str);
    fn play(&self, style: SoundStyle);
}

#[derive(Debug, Clone)]
pub struct TerminalNotifier {
    sound: bool,
}

impl TerminalNotifier {
    pub fn new(sound: bool) -> Self {
        Self { sound }
    }
}

impl Notifier for TerminalNotifier {
    fn toast(&self, message: &str) {
        info!(message, "toast");
        eprintln!("{message}");
    }

    fn play(&self, style: SoundStyle) {
        if !self.sound {
            debug!(%style, "sound disabled; skipping");
            return;
        }
        let mut err = io::stderr().lock();
        if !err.is_terminal() {
            debug!(%style, "stderr is not a terminal; skipping bell");
            return;
        }
        let _ = write!(err, "{}", "\x07".repeat(style.bells()));
        let _ = err.flush();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Toast(String),
    Sound(SoundStyle),
}

/// Keeps every notice in memory. Useful for tests and embedders that render
/// notices themselves.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn toasts(&self) -> Vec<String> {
        self.notices
            .lock()
            .iter()
            .filter_map(|notice| match notice {
                Notice::Toast(message) => Some(message.clone()),
                Notice::Sound(_) => None,
            })
            .collect()
    }

    pub fn take(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock())
    }
}

impl Notifier for RecordingNotifier {
    fn toast(&self, message: &str) {
        self.notices.lock().push(Notice::Toast(message.to_string()));
    }

    fn play(&self, style: SoundStyle) {
        self.notices.lock().push(Notice::Sound(style));
    }
}

impl<N: Notifier + Sync + ?Sized> Notifier for std::sync::Arc<N> {
    fn toast(&self, message: &str) {
        (**self).toast(message);
    }

    fn play(&self, style: SoundStyle) {
        (**self).play(style);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sound_styles_parse() {
        assert_eq!("Chime".parse::<SoundStyle>().unwrap(), SoundStyle::Chime);
        assert!("klaxon".parse::<SoundStyle>().is_err());
    }

    #[test]
    fn recorder_keeps_order() {
        let recorder = RecordingNotifier::new();
        recorder.toast("hello");
        recorder.play(SoundStyle::Soft);
        assert_eq!(
            recorder.take(),
            vec![Notice::Toast("hello".to_string()), Notice::Sound(SoundStyle::Soft)]
        );
        assert!(recorder.notices().is_empty());
    }
}
