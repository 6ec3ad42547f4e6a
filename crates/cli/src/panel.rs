//! Console chat panel.
//!
//! The panel owns the interactive loop: it mounts onto the terminal, drives
//! the conversation engine turn by turn, and renders replies. Ctrl+C during
//! a turn cancels that turn, not the panel.

use crate::error::{Error, Result};
use crate::status;
use runtime::{Agent, TurnTransport};
use std::io::{self, BufRead, IsTerminal, Write};
use tokio_util::sync::CancellationToken;

pub struct ConsolePanel;

impl ConsolePanel {
    pub fn new() -> Self {
        Self
    }

    /// Mount onto the terminal and drive the engine until EOF or quit.
    ///
    /// Fails when the terminal container is missing; that is surfaced to the
    /// boot sequence, not recovered here.
    pub async fn mount<T: TurnTransport>(&mut self, mut agent: Agent<T>) -> Result<()> {
        if !io::stdin().is_terminal() {
            return Err(Error::Mount(
                "standard input is not an interactive terminal".to_string(),
            ));
        }

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("> ");
            stdout.flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                // EOF
                break;
            }

            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            if input == "quit" || input == "exit" {
                break;
            }

            let cancel = CancellationToken::new();
            let watcher = {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        cancel.cancel();
                    }
                })
            };

            match agent.prompt_with(input, cancel).await {
                Ok(reply) => println!("\n{}\n", reply.text()),
                Err(runtime::Error::Cancelled) => println!("\n(turn cancelled)\n"),
                Err(e) => status::report(&format!("error: {e}")),
            }
            watcher.abort();
        }

        println!("\nSession ended.");
        Ok(())
    }
}

impl Default for ConsolePanel {
    fn default() -> Self {
        Self::new()
    }
}
