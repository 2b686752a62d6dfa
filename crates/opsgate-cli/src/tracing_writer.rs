//! Tracing writers for the terminal and file log layers.
//!
//! Each writer backs its own `fmt` layer so the two outputs are filtered
//! independently.
//!
//! - [`TerminalMakeWriter`]: through the console's [`SharedPrinterSlot`]
//!   while the prompt is shown, stdout otherwise. Never blocks.
//! - [`FileMakeWriter`]: appends to the log file. Pair it with
//!   `.with_ansi(false)`.

use opsgate_app::{PrintResult, SharedPrinterSlot};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
pub struct TerminalMakeWriter {
    slot: SharedPrinterSlot,
}

impl TerminalMakeWriter {
    pub fn new(slot: &SharedPrinterSlot) -> Self {
        Self { slot: slot.clone() }
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for TerminalMakeWriter {
    type Writer = TerminalWriter;

    fn make_writer(&'a self) -> Self::Writer {
        TerminalWriter {
            slot: self.slot.clone(),
            buf: Vec::with_capacity(256),
        }
    }
}

/// Buffers one event and hands it to the printer slot on drop.
pub struct TerminalWriter {
    slot: SharedPrinterSlot,
    buf: Vec<u8>,
}

impl Write for TerminalWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for TerminalWriter {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let msg = String::from_utf8_lossy(&self.buf).into_owned();
        if self.slot.try_print(msg) == PrintResult::NoPrinter {
            let mut out = io::stdout().lock();
            let _ = out.write_all(&self.buf);
            let _ = out.flush();
        }
    }
}

#[derive(Clone)]
pub struct FileMakeWriter {
    file: Arc<Mutex<File>>,
}

impl FileMakeWriter {
    pub fn new(file: Arc<Mutex<File>>) -> Self {
        Self { file }
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FileMakeWriter {
    type Writer = FileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        FileWriter {
            file: Arc::clone(&self.file),
            buf: Vec::with_capacity(256),
        }
    }
}

/// Buffers one event and appends it under the file lock on drop.
pub struct FileWriter {
    file: Arc<Mutex<File>>,
    buf: Vec<u8>,
}

impl Write for FileWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let mut file = self.file.lock();
        let _ = file.write_all(&self.buf);
        let _ = file.flush();
    }
}

/// Opens `path` for appending, creating parent directories.
///
/// Failures are reported on stderr and disable file logging.
pub fn open_log_file(path: &Path) -> Option<Arc<Mutex<File>>> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Warning: cannot create log directory {}: {e}", dir.display());
            return None;
        }
    }
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    {
        Ok(file) => Some(Arc::new(Mutex::new(file))),
        Err(e) => {
            eprintln!("Warning: cannot open log file {}: {e}", path.display());
            None
        }
    }
}
