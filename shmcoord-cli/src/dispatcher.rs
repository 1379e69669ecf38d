// SPDX-License-Identifier: Apache-2.0

//! Line-oriented command dispatcher.
//!
//! Blocks on the next stdin line (no polling), maps each command onto a
//! coordinator operation, and turns operation failures into error events.
//! The loop only terminates on end-of-input or an explicit `exit`, and
//! both paths finish with a best-effort reset.

use std::io::BufRead;

use shmcoord_core::{Coordinator, Event, EventKind, EventSink};

/// Commands understood by the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create,
    Attach,
    Write(String),
    Read,
    Detach,
    Cleanup,
    Status,
    Reset,
    Exit,
}

/// Outcome of parsing one input line.
#[derive(Debug, PartialEq, Eq)]
pub enum ParsedLine {
    /// Blank input, ignored.
    Empty,
    Command(Command),
    /// Anything else; reported as an error event.
    Unknown(String),
}

pub fn parse_line(line: &str) -> ParsedLine {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ParsedLine::Empty;
    }

    // `write` keeps the remainder verbatim; a bare `write` stores the
    // empty message, which the coordinator permits
    if let Some(rest) = trimmed.strip_prefix("write") {
        if rest.is_empty() {
            return ParsedLine::Command(Command::Write(String::new()));
        }
        if let Some(message) = rest.strip_prefix(' ') {
            return ParsedLine::Command(Command::Write(message.to_string()));
        }
        return ParsedLine::Unknown(trimmed.to_string());
    }

    match trimmed {
        "create" => ParsedLine::Command(Command::Create),
        "attach" => ParsedLine::Command(Command::Attach),
        "read" => ParsedLine::Command(Command::Read),
        "detach" => ParsedLine::Command(Command::Detach),
        "cleanup" => ParsedLine::Command(Command::Cleanup),
        "status" => ParsedLine::Command(Command::Status),
        "reset" => ParsedLine::Command(Command::Reset),
        "exit" => ParsedLine::Command(Command::Exit),
        other => ParsedLine::Unknown(other.to_string()),
    }
}

/// Run the command loop to completion.
pub fn run<S: EventSink, R: BufRead>(
    coordinator: &mut Coordinator<S>,
    input: R,
) -> std::io::Result<()> {
    coordinator.emit(Event::new(
        EventKind::System,
        "Shared memory monitor started - awaiting commands",
    ));
    coordinator.emit(Event::new(
        EventKind::Instruction,
        "Available commands: create, attach, write <message>, read, detach, cleanup, status, reset, exit",
    ));
    let config = coordinator.config();
    coordinator.emit(Event::with_data(
        EventKind::Config,
        "Using IPC keys",
        format!("segment={} gate={}", config.segment_key, config.gate_key),
    ));

    for line in input.lines() {
        let line = line?;
        match parse_line(&line) {
            ParsedLine::Empty => {}
            ParsedLine::Unknown(text) => coordinator.emit(Event::new(
                EventKind::Error,
                format!("Unrecognized command: {}", text),
            )),
            ParsedLine::Command(command) => {
                if !dispatch(coordinator, command) {
                    break;
                }
            }
        }
    }

    coordinator.reset();
    coordinator.emit(Event::new(EventKind::System, "Shared memory monitor stopped"));
    Ok(())
}

/// Execute one command; returns false when the loop should end.
///
/// Operation errors become error events and never stop the loop.
fn dispatch<S: EventSink>(coordinator: &mut Coordinator<S>, command: Command) -> bool {
    let result = match command {
        Command::Create => coordinator.create(),
        Command::Attach => coordinator.attach(),
        Command::Write(message) => coordinator.write(&message).map(|_| ()),
        Command::Read => coordinator.read().map(|_| ()),
        Command::Detach => coordinator.detach(),
        Command::Cleanup => coordinator.cleanup(),
        Command::Status => match coordinator.snapshot() {
            Ok(state) => {
                coordinator.emit_state(&state);
                Ok(())
            }
            Err(e) => Err(e),
        },
        Command::Reset => {
            coordinator.reset();
            Ok(())
        }
        Command::Exit => {
            coordinator.emit(Event::new(EventKind::System, "Exit requested"));
            return false;
        }
    };

    if let Err(e) = result {
        coordinator.emit(Event::new(EventKind::Error, e.to_string()));
    }
    true
}
