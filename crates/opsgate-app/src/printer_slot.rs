//! Shared printer slot for terminal-safe output while the prompt is active.
//!
//! Shared between the [`Console`](crate::Console), which installs the
//! readline printer for the interactive loop, and the terminal log writer
//! in `opsgate-cli`. An empty slot means "write directly".
//!
//! Callers never block: messages go through a bounded channel drained by a
//! dedicated thread, and are dropped when the channel is full.

use parking_lot::Mutex;
use rustyline::ExternalPrinter;
use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::sync::Arc;

/// Outcome of [`SharedPrinterSlot::try_print`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintResult {
    Sent,
    /// No printer installed. The caller writes directly.
    NoPrinter,
    /// Channel full. The message is lost to the terminal only.
    Dropped,
}

struct DrainedPrinter {
    tx: SyncSender<String>,
}

impl DrainedPrinter {
    const CAPACITY: usize = 256;

    fn spawn(mut printer: Box<dyn ExternalPrinter + Send>) -> std::io::Result<Self> {
        let (tx, rx) = sync_channel::<String>(Self::CAPACITY);
        std::thread::Builder::new()
            .name("opsgate-printer".into())
            .spawn(move || {
                while let Ok(msg) = rx.recv() {
                    if printer.print(msg).is_err() {
                        break;
                    }
                }
            })?;
        Ok(Self { tx })
    }

    fn try_print(&self, msg: String) -> PrintResult {
        match self.tx.try_send(msg) {
            Ok(()) => PrintResult::Sent,
            Err(TrySendError::Full(_)) => PrintResult::Dropped,
            // Drain thread gone; behave as if nothing was installed.
            Err(TrySendError::Disconnected(_)) => PrintResult::NoPrinter,
        }
    }
}

/// Cloneable handle to an optional readline printer.
#[derive(Clone, Default)]
pub struct SharedPrinterSlot {
    inner: Arc<Mutex<Option<DrainedPrinter>>>,
}

impl std::fmt::Debug for SharedPrinterSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedPrinterSlot")
            .field("installed", &self.is_installed())
            .finish()
    }
}

impl SharedPrinterSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `printer`. On failure the slot stays empty.
    pub fn set(&self, printer: Box<dyn ExternalPrinter + Send>) {
        match DrainedPrinter::spawn(printer) {
            Ok(p) => *self.inner.lock() = Some(p),
            Err(e) => tracing::error!(error = %e, "failed to start printer thread"),
        }
    }

    /// Removes the printer; its drain thread exits.
    pub fn clear(&self) {
        *self.inner.lock() = None;
    }

    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.inner.lock().is_some()
    }

    pub fn try_print(&self, msg: String) -> PrintResult {
        match self.inner.lock().as_ref() {
            Some(printer) => printer.try_print(msg),
            None => PrintResult::NoPrinter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<String>>>);

    impl ExternalPrinter for Captured {
        fn print(&mut self, msg: String) -> rustyline::Result<()> {
            self.0.lock().push(msg);
            Ok(())
        }
    }

    #[test]
    fn empty_slot_reports_no_printer() {
        let slot = SharedPrinterSlot::new();
        assert!(!slot.is_installed());
        assert_eq!(slot.try_print("x".into()), PrintResult::NoPrinter);
    }

    #[test]
    fn installed_printer_receives_messages() {
        let slot = SharedPrinterSlot::new();
        let captured = Captured::default();
        slot.set(Box::new(captured.clone()));
        assert!(slot.is_installed());

        assert_eq!(slot.try_print("hello".into()), PrintResult::Sent);

        for _ in 0..100 {
            if !captured.0.lock().is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(*captured.0.lock(), vec!["hello".to_string()]);

        slot.clear();
        assert_eq!(slot.try_print("late".into()), PrintResult::NoPrinter);
    }
}
