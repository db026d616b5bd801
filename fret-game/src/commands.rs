//! Player commands read from stdin.

use std::io::BufRead;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use tracing::debug;

/// One line of player input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Status,
    Help,
    Quit,
}

impl Command {
    /// Parses a trimmed, case-insensitive command word.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "start" | "s" => Some(Command::Start),
            "stop" | "x" => Some(Command::Stop),
            "status" | "?" => Some(Command::Status),
            "help" | "h" => Some(Command::Help),
            "quit" | "q" | "exit" => Some(Command::Quit),
            _ => None,
        }
    }
}

pub const HELP: &str = "commands: start, stop, status, help, quit";

/// Forwards parsed stdin lines until stdin closes or the receiver goes away.
///
/// Unknown input is answered with the help text right here.
pub fn spawn_reader(commands: Sender<Command>) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("fret-stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match Command::parse(&line) {
                    Some(command) => {
                        if commands.send(command).is_err() {
                            break;
                        }
                    }
                    None => println!("unknown command '{}'; {}", line.trim(), HELP),
                }
            }
            debug!("[INPUT] Stdin closed");
        })
}
