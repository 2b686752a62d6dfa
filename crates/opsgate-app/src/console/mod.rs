//! Operator console.
//!
//! Wraps an [`AccessContext`] with a line-oriented command interface.
//!
//! # Input Flow
//!
//! ```text
//! readline thread ──ReadlineEvent──┐
//!                                  ▼
//!                        run_interactive (select!, biased)
//!                          │                   │
//!            bootstrap StateChange        ConsoleCommand::parse
//!                          │                   │
//!                  describe_state          execute → Reply
//!                          └────────┬──────────┘
//!                                   ▼
//!                     SharedPrinterSlot / stdout
//! ```
//!
//! Background transitions (a failed token refresh, an expired session)
//! are printed as they happen. Transitions caused by a command are
//! reported by the command's own reply.

mod builder;
mod command;
mod render;

pub use builder::ConsoleBuilder;
pub use command::{ConsoleCommand, DEFAULT_REASON};
pub use render::describe_state;

use crate::{AppError, PrintResult, SharedPrinterSlot};
use opsgate_auth::AccessDenied;
use opsgate_runtime::{AccessContext, BootstrapPhase, OpsConfig, StateChange};
use opsgate_types::ErrorCode;
use rustyline::ExternalPrinter as RustylineExternalPrinter;
use std::path::PathBuf;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::mpsc;

/// Control flow for the input loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Exit,
}

/// Result of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Text to show. Empty shows nothing.
    pub text: String,
    pub control: LoopControl,
    /// The command did not do what was asked.
    pub failed: bool,
}

impl Reply {
    fn say(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            control: LoopControl::Continue,
            failed: false,
        }
    }

    fn nothing() -> Self {
        Self::say("")
    }

    fn quit() -> Self {
        Self {
            text: String::new(),
            control: LoopControl::Exit,
            failed: false,
        }
    }

    fn fail(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            control: LoopControl::Continue,
            failed: true,
        }
    }

    fn error(err: AppError) -> Self {
        tracing::debug!(code = err.code(), "command failed: {err}");
        Self::fail(format!("Error: {err}"))
    }
}

/// Event sent from the readline thread to the async loop.
#[derive(Debug)]
enum ReadlineEvent {
    Line(String),
    /// Ctrl+D, end of piped input, or a terminal error.
    Eof,
}

/// The operator console.
pub struct Console {
    config: OpsConfig,
    context: AccessContext,
    printer_slot: SharedPrinterSlot,
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("state", &self.context.state())
            .finish_non_exhaustive()
    }
}

impl Console {
    #[must_use]
    pub fn builder(config: OpsConfig) -> ConsoleBuilder {
        ConsoleBuilder::new(config)
    }

    #[must_use]
    pub fn context(&self) -> &AccessContext {
        &self.context
    }

    #[must_use]
    pub fn config(&self) -> &OpsConfig {
        &self.config
    }

    /// Runs one command.
    pub async fn execute(&self, command: ConsoleCommand) -> Reply {
        match command {
            ConsoleCommand::Status => Reply::say(describe_state(&self.context.state())),
            ConsoleCommand::Whoami => match self.context.subject() {
                Some(subject) => Reply::say(render::whoami(&subject)),
                None => Reply::error(AccessDenied::NoSession.into()),
            },
            ConsoleCommand::Caps => {
                let views = self.context.capabilities();
                if views.is_empty() {
                    Reply::error(AccessDenied::NoSession.into())
                } else {
                    Reply::say(render::capabilities(&views))
                }
            }
            ConsoleCommand::Elevate { capability, reason } => {
                match self.context.request_elevation(capability, &reason).await {
                    Ok(outcome) => {
                        let text = render::elevation(capability, &outcome);
                        if outcome.approved {
                            Reply::say(text)
                        } else {
                            Reply::fail(text)
                        }
                    }
                    Err(e) => Reply::error(e.into()),
                }
            }
            ConsoleCommand::Launch(tool) => match self.context.launch(tool) {
                Ok(result) if result.ok => Reply::say(render::launch(tool, &result)),
                Ok(result) => Reply::fail(render::launch(tool, &result)),
                Err(denied) => Reply::error(denied.into()),
            },
            ConsoleCommand::Code(code) => {
                if self.context.bootstrap().phase() != BootstrapPhase::Redirecting {
                    return Reply::fail("No sign-in in progress. Type 'retry' to start one.");
                }
                Reply::say(describe_state(&self.context.complete_login(&code).await))
            }
            ConsoleCommand::Retry => {
                let state = if self.context.bootstrap().phase() == BootstrapPhase::Idle {
                    self.context.start().await
                } else {
                    self.context.retry().await
                };
                Reply::say(describe_state(&state))
            }
            ConsoleCommand::Logout => match self.context.logout().await {
                Some(_) => Reply::say("Signed out."),
                None => Reply::say("No active session."),
            },
            ConsoleCommand::Help => Reply::say(render::HELP),
            ConsoleCommand::Quit => Reply::quit(),
            ConsoleCommand::Empty => Reply::nothing(),
            ConsoleCommand::Invalid(msg) => Reply::error(AppError::Usage(msg)),
        }
    }

    /// Starts the session, runs a single command, then abandons the
    /// session locally. The provider session and token cache are kept.
    ///
    /// Returns the process exit code: `0` on success, `1` if the command
    /// failed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Usage`] for input that is not a command.
    pub async fn run_command(&self, line: &str) -> Result<i32, AppError> {
        let command = ConsoleCommand::parse(line);
        if let ConsoleCommand::Invalid(msg) = command {
            return Err(AppError::Usage(msg));
        }

        let state = self.context.start().await;
        tracing::info!(%state, "session settled");

        let reply = self.execute(command).await;
        self.print(&reply.text);
        self.context.shutdown();
        Ok(i32::from(reply.failed))
    }

    /// Runs the interactive loop until `quit` or end of input.
    ///
    /// The session is started first and its state printed. Line editing
    /// runs on a dedicated OS thread; all output during the loop goes
    /// through the readline printer.
    ///
    /// # Errors
    ///
    /// Does not fail at present.
    pub async fn run_interactive(&self) -> Result<(), AppError> {
        self.print("opsgate console. Type 'help' for commands, 'q' to quit.");
        self.print("Connecting to identity provider...");

        let mut events = self.context.bootstrap().subscribe();
        let state = self.context.start().await;
        self.print(&describe_state(&state));
        drain(&mut events);

        let (mut readline_rx, printer) = spawn_readline_thread(self.config.paths.history_path());
        if let Some(p) = printer {
            self.printer_slot.set(p);
        }

        loop {
            tokio::select! {
                biased;

                change = events.recv() => match change {
                    Ok(change) => self.on_state_change(change),
                    Err(RecvError::Lagged(n)) => {
                        tracing::debug!(skipped = n, "state events lagged");
                        self.print(&describe_state(&self.context.state()));
                    }
                    Err(RecvError::Closed) => break,
                },
                event = readline_rx.recv() => match event {
                    Some(ReadlineEvent::Line(line)) => {
                        let reply = self.execute(ConsoleCommand::parse(&line)).await;
                        self.print(&reply.text);
                        drain(&mut events);
                        if reply.control == LoopControl::Exit {
                            tracing::info!("quit requested");
                            break;
                        }
                    }
                    Some(ReadlineEvent::Eof) | None => {
                        tracing::debug!("readline: EOF or channel closed");
                        break;
                    }
                },
            }
        }

        self.printer_slot.clear();
        self.context.shutdown();
        self.print("Shutting down...");
        Ok(())
    }

    fn on_state_change(&self, change: StateChange) {
        tracing::debug!(
            from = %change.from,
            to = %change.to,
            epoch = change.epoch,
            "background transition"
        );
        if matches!(
            change.to,
            BootstrapPhase::Probing | BootstrapPhase::Initializing | BootstrapPhase::SessionActive
        ) {
            return;
        }
        self.print(&describe_state(&self.context.state()));
    }

    /// Prints through the readline printer if installed, else to stdout.
    fn print(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut msg = text.to_string();
        if !msg.ends_with('\n') {
            msg.push('\n');
        }
        match self.printer_slot.try_print(msg) {
            PrintResult::Sent | PrintResult::Dropped => {}
            PrintResult::NoPrinter => println!("{text}"),
        }
    }
}

/// Discards transitions already reported by a command reply.
fn drain(events: &mut broadcast::Receiver<StateChange>) {
    loop {
        match events.try_recv() {
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

/// Spawns the readline thread.
///
/// Returns the event receiver and, when the terminal supports it, a
/// printer for output while the prompt is shown. History is saved after
/// every line.
fn spawn_readline_thread(
    history_path: PathBuf,
) -> (
    mpsc::UnboundedReceiver<ReadlineEvent>,
    Option<Box<dyn RustylineExternalPrinter + Send>>,
) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (printer_tx, printer_rx) =
        std::sync::mpsc::sync_channel::<Option<Box<dyn RustylineExternalPrinter + Send>>>(1);

    if let Err(e) = std::thread::Builder::new()
        .name("opsgate-readline".into())
        .spawn(move || {
            let config = rustyline::Config::builder().auto_add_history(true).build();
            let mut rl = match rustyline::DefaultEditor::with_config(config) {
                Ok(editor) => editor,
                Err(e) => {
                    tracing::error!("failed to create readline editor: {e}");
                    let _ = printer_tx.send(None);
                    let _ = event_tx.send(ReadlineEvent::Eof);
                    return;
                }
            };

            if let Some(dir) = history_path.parent() {
                let _ = std::fs::create_dir_all(dir);
            }
            if let Err(e) = rl.load_history(&history_path) {
                tracing::debug!("history load: {e} (expected on first run)");
            }

            let printer = rl
                .create_external_printer()
                .ok()
                .map(|p| Box::new(p) as Box<dyn RustylineExternalPrinter + Send>);
            let _ = printer_tx.send(printer);

            loop {
                match rl.readline("opsgate> ") {
                    Ok(line) => {
                        let _ = rl.save_history(&history_path);
                        if event_tx.send(ReadlineEvent::Line(line)).is_err() {
                            break;
                        }
                    }
                    Err(rustyline::error::ReadlineError::Interrupted) => continue,
                    Err(rustyline::error::ReadlineError::Eof) => {
                        let _ = event_tx.send(ReadlineEvent::Eof);
                        break;
                    }
                    Err(e) => {
                        tracing::error!("readline error: {e}");
                        let _ = event_tx.send(ReadlineEvent::Eof);
                        break;
                    }
                }
            }
            let _ = rl.save_history(&history_path);
        })
    {
        tracing::error!("failed to spawn readline thread: {e}");
    }

    let printer = printer_rx.recv().ok().flatten();
    (event_rx, printer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsgate_runtime::BootstrapState;

    #[tokio::test]
    async fn drain_empties_receiver() {
        let (tx, mut rx) = broadcast::channel(4);
        for epoch in 0..3 {
            tx.send(StateChange {
                epoch,
                from: BootstrapPhase::Idle,
                to: BootstrapPhase::Probing,
            })
            .unwrap();
        }
        drain(&mut rx);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn reply_constructors() {
        assert_eq!(Reply::quit().control, LoopControl::Exit);
        assert!(!Reply::nothing().failed);
        let err = Reply::error(AppError::Usage("unknown command 'x'".into()));
        assert!(err.failed);
        assert_eq!(err.text, "Error: unknown command 'x'");
        assert_eq!(
            describe_state(&BootstrapState::Idle),
            "Session: signed out. Type 'retry' to sign in."
        );
    }
}
