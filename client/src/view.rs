//! # View
//!
//! What the controller tells the user interface, and the terminal
//! implementation of it. The terminal view is line-oriented: it cannot take
//! back the typing placeholder once printed, so it only prints it when it
//! appears.

use std::io::{self, Write};

use crate::state::{ConnectionState, ConnectionStatus};
use crate::transcript::{Entry, Speaker};

pub trait View: Send {
    fn status_changed(&mut self, status: &ConnectionStatus);

    /// Message input (and the voice toggle) became usable or unusable.
    fn input_toggled(&mut self, enabled: bool);

    fn entry_added(&mut self, entry: &Entry);

    /// The typing placeholder appeared (`true`) or was removed (`false`).
    fn typing_changed(&mut self, active: bool);

    /// Transient feedback that is not part of the transcript.
    fn notice(&mut self, text: &str);
}

pub struct TerminalView<W = io::Stdout> {
    agent_name: String,
    out: W,
}

impl TerminalView {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self::with_writer(agent_name, io::stdout())
    }
}

impl<W: Write + Send> TerminalView<W> {
    pub fn with_writer(agent_name: impl Into<String>, out: W) -> Self {
        Self {
            agent_name: agent_name.into(),
            out,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: std::fmt::Arguments<'_>) {
        // A closed stdout is not worth tearing the client down for.
        let _ = writeln!(self.out, "{text}");
        let _ = self.out.flush();
    }
}

impl<W: Write + Send> View for TerminalView<W> {
    fn status_changed(&mut self, status: &ConnectionStatus) {
        let marker = match status.state {
            ConnectionState::Connecting => "..",
            ConnectionState::Open => "ok",
            ConnectionState::Closed => "!!",
        };
        self.line(format_args!("[{marker}] {}", status.text));
    }

    fn input_toggled(&mut self, enabled: bool) {
        if enabled {
            self.line(format_args!("(type a message and press enter, /help for commands)"));
        } else {
            self.line(format_args!("(input disabled until reconnected)"));
        }
    }

    fn entry_added(&mut self, entry: &Entry) {
        match entry {
            Entry::Said { speaker, text } => {
                let who = match speaker {
                    Speaker::User => "you",
                    Speaker::Agent => "agent",
                    Speaker::System => "*",
                };
                self.line(format_args!("{who}> {text}"));
            }
            Entry::Typing => self.typing_changed(true),
        }
    }

    fn typing_changed(&mut self, active: bool) {
        if active {
            let name = self.agent_name.clone();
            self.line(format_args!("   {name} is thinking..."));
        }
    }

    fn notice(&mut self, text: &str) {
        self.line(format_args!("-- {text}"));
    }
}
