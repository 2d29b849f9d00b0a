//! # Terminal Commands
//!
//! Turns stdin lines into controller events. Lines starting with `/` are
//! commands; everything else is a message to the agent.

use std::io::{self, BufRead};
use std::thread;

use tracing::debug;

use crate::controller::{ControllerEvent, EventSender};

pub const HELP: &str = "\
commands:
  /reconnect   drop the current connection and connect again
  /voice       start or stop voice input
  /clear       clear the conversation on the server
  /info        log the server's session info
  /help        show this help
  /quit        exit";

/// What a single line of input means.
#[derive(Debug)]
pub enum Input {
    Event(ControllerEvent),
    Help,
    Unknown(String),
}

pub fn parse_line(line: &str) -> Input {
    let trimmed = line.trim();
    if !trimmed.starts_with('/') {
        return Input::Event(ControllerEvent::Submit(line.to_string()));
    }
    let event = match trimmed {
        "/quit" | "/exit" => ControllerEvent::Shutdown,
        "/reconnect" => ControllerEvent::Reconnect,
        "/voice" => ControllerEvent::ToggleVoice,
        "/clear" => ControllerEvent::ClearSession,
        "/info" => ControllerEvent::RequestSessionInfo,
        "/help" => return Input::Help,
        other => return Input::Unknown(other.to_string()),
    };
    Input::Event(event)
}

/// Reads stdin on a dedicated thread, posting each line to the controller.
///
/// Reading happens on a plain thread so a pending read never holds up
/// runtime shutdown. EOF (Ctrl-D) shuts the controller down.
pub fn spawn_stdin_reader(events: EventSender) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    debug!("stdin closed: {}", e);
                    break;
                }
            };
            let event = match parse_line(&line) {
                Input::Event(event) => event,
                Input::Help => {
                    println!("{HELP}");
                    continue;
                }
                Input::Unknown(command) => {
                    println!("-- unknown command {command}, try /help");
                    continue;
                }
            };
            if events.send(event).is_err() {
                return;
            }
        }
        let _ = events.send(ControllerEvent::Shutdown);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn plain_lines_are_messages() {
        assert_matches!(
            parse_line("weather in Lisbon?"),
            Input::Event(ControllerEvent::Submit(text)) if text == "weather in Lisbon?"
        );
        assert_matches!(
            parse_line(""),
            Input::Event(ControllerEvent::Submit(text)) if text.is_empty()
        );
    }

    #[test]
    fn slash_lines_are_commands() {
        assert_matches!(parse_line("/quit"), Input::Event(ControllerEvent::Shutdown));
        assert_matches!(parse_line(" /reconnect "), Input::Event(ControllerEvent::Reconnect));
        assert_matches!(parse_line("/voice"), Input::Event(ControllerEvent::ToggleVoice));
        assert_matches!(parse_line("/clear"), Input::Event(ControllerEvent::ClearSession));
        assert_matches!(parse_line("/info"), Input::Event(ControllerEvent::RequestSessionInfo));
        assert_matches!(parse_line("/help"), Input::Help);
        assert_matches!(parse_line("/dance"), Input::Unknown(c) if c == "/dance");
    }
}
