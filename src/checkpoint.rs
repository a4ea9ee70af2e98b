//! Human-in-the-loop pauses.

use std::fmt;
use std::io::{self, BufRead};

use async_trait::async_trait;
use console::style;

/// Points where the run waits for a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    /// The challenge-assist extension was loaded and may need setting up.
    AssistSetup,
    /// Automatic challenge solving gave up; finish it in the browser window.
    ManualChallenge,
}

impl fmt::Display for Pause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pause::AssistSetup => write!(
                f,
                "Configure the challenge-assist extension in the browser window, then press Enter"
            ),
            Pause::ManualChallenge => write!(
                f,
                "Solve the challenge in the browser window until you are logged in, then press Enter"
            ),
        }
    }
}

/// Blocks the control flow until a human confirms.
#[async_trait]
pub trait Checkpoint: Send + Sync {
    async fn confirm(&self, pause: Pause) -> io::Result<()>;
}

/// Prompts on stderr and waits for a line on stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalCheckpoint;

#[async_trait]
impl Checkpoint for TerminalCheckpoint {
    async fn confirm(&self, pause: Pause) -> io::Result<()> {
        eprintln!();
        eprintln!("{} {}", style("⏸").yellow().bold(), style(pause).bold());

        tokio::task::spawn_blocking(|| read_confirmation(io::stdin().lock()))
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
    }
}

/// Wait for one line. A closed input cannot confirm anything.
fn read_confirmation<R: BufRead>(mut input: R) -> io::Result<()> {
    let mut line = String::new();
    match input.read_line(&mut line)? {
        0 => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stdin closed before confirmation",
        )),
        _ => Ok(()),
    }
}

/// Records pauses instead of blocking.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingCheckpoint {
    pauses: std::sync::Arc<std::sync::Mutex<Vec<Pause>>>,
}

#[cfg(test)]
impl RecordingCheckpoint {
    pub fn pauses(&self) -> Vec<Pause> {
        self.pauses.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Checkpoint for RecordingCheckpoint {
    async fn confirm(&self, pause: Pause) -> io::Result<()> {
        self.pauses.lock().unwrap().push(pause);
        Ok(())
    }
}
