//! # Speech Sinks
//!
//! Voice input and output are external programs behind two small traits:
//! - [`SpeechOutput`] speaks agent replies (e.g. `espeak`, `say`)
//! - [`SpeechInput`] records one utterance and yields its final transcript
//!   (e.g. a whisper.cpp wrapper script)
//!
//! A recognised utterance is posted as [`ControllerEvent::Submit`], so the
//! controller sends it exactly like typed text.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::controller::{ControllerEvent, EventSender};
use crate::error::ClientError;

// ─── Output ─────────────────────────────────────────────────────

pub trait SpeechOutput: Send {
    /// Speaks `text`, interrupting anything still being spoken.
    fn speak(&mut self, text: &str);

    /// Stops the current utterance, if any.
    fn cancel(&mut self);
}

/// Speech output that says nothing.
pub struct Silent;

impl SpeechOutput for Silent {
    fn speak(&mut self, _text: &str) {}
    fn cancel(&mut self) {}
}

/// Speaks through an external text-to-speech command.
///
/// The reply is appended as the command's last argument.
pub struct CommandSpeaker {
    command: String,
    current: Option<Child>,
}

impl CommandSpeaker {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            current: None,
        }
    }
}

impl SpeechOutput for CommandSpeaker {
    fn speak(&mut self, text: &str) {
        self.cancel();

        let text = speakable_text(text);
        if text.trim().is_empty() {
            return;
        }
        let Some(mut cmd) = build_command(&self.command) else {
            return;
        };
        cmd.arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match cmd.spawn() {
            Ok(child) => self.current = Some(child),
            Err(source) => {
                let err = ClientError::Spawn {
                    command: self.command.clone(),
                    source,
                };
                warn!("{err}");
            }
        }
    }

    fn cancel(&mut self) {
        if let Some(mut child) = self.current.take() {
            let _ = child.start_kill();
        }
    }
}

/// Strips characters a synthesizer would read out literally (emoji,
/// markdown, symbols), keeping letters, digits, whitespace and `.,!?-_`.
pub fn speakable_text(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || ".,!?-_".contains(*c))
        .collect()
}

// ─── Input ──────────────────────────────────────────────────────

pub trait SpeechInput: Send {
    /// Starts listening for one utterance. Its transcript is posted to `events`.
    fn start(&mut self, events: EventSender) -> Result<(), ClientError>;

    /// Stops listening and discards the utterance.
    fn stop(&mut self);

    fn is_listening(&self) -> bool;
}

/// Recognizes speech through an external command.
///
/// The command records a single utterance and prints its transcript; the
/// last non-empty line it prints before exiting is taken as final.
pub struct CommandRecognizer {
    command: String,
    task: Option<JoinHandle<()>>,
}

impl CommandRecognizer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            task: None,
        }
    }
}

impl SpeechInput for CommandRecognizer {
    fn start(&mut self, events: EventSender) -> Result<(), ClientError> {
        self.stop();

        let mut cmd = build_command(&self.command)
            .ok_or(ClientError::SpeechUnavailable("speech-to-text command is empty"))?;
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        let mut child = cmd.spawn().map_err(|source| ClientError::Spawn {
            command: self.command.clone(),
            source,
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or(ClientError::SpeechUnavailable("speech-to-text command has no stdout"))?;

        self.task = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut heard = None;
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim();
                if !line.is_empty() {
                    debug!(partial = line, "Recognizer output");
                    heard = Some(line.to_string());
                }
            }
            let _ = child.wait().await;

            match heard {
                Some(text) => {
                    info!("Heard: {}", text);
                    let _ = events.send(ControllerEvent::Submit(text));
                }
                None => debug!("Recognizer finished without a transcript"),
            }
        }));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            // Dropping the child inside the task kills the recognizer.
            task.abort();
        }
    }

    fn is_listening(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

/// Splits a configured command line into program and arguments.
fn build_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    let mut cmd = Command::new(parts.next()?);
    cmd.args(parts);
    Some(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tokio::sync::mpsc;

    #[test]
    fn speakable_text_drops_symbols() {
        assert_eq!(
            speakable_text("🌍 Welcome! **Kyoto** costs ~$80/night."),
            " Welcome! Kyoto costs 80night."
        );
        assert_eq!(speakable_text("well-known, isn't it?"), "well-known, isnt it?");
    }

    #[test]
    fn empty_commands_are_rejected() {
        assert!(build_command("   ").is_none());
    }

    #[tokio::test]
    async fn blank_command_is_unavailable() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut recognizer = CommandRecognizer::new("");
        assert_matches!(
            recognizer.start(tx),
            Err(ClientError::SpeechUnavailable(_))
        );
        assert!(!recognizer.is_listening());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn recognizer_submits_the_last_line() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut recognizer = CommandRecognizer::new("printf partial\\nbook\\na\\nflight\\n");
        recognizer.start(tx).unwrap();

        let event = rx.recv().await.unwrap();
        assert_matches!(event, ControllerEvent::Submit(text) if text == "flight");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut recognizer = CommandRecognizer::new("definitely-not-a-real-recognizer-binary");
        assert_matches!(recognizer.start(tx), Err(ClientError::Spawn { .. }));
    }
}
