use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;

use chrono::Local;
use tracing::{info, warn};

/// Append-only run journal.
///
/// Every line is flushed as soon as it is written and mirrored to the
/// live log, so a run that aborts mid-batch still leaves a complete
/// record of everything that happened before the failure. The
/// underlying writer is released on drop, on every exit path.
pub struct Journal<W> {
    sink: W,
    started: Instant,
}

impl Journal<File> {
    /// Opens `path` for appending; each run's output accumulates below
    /// prior runs, nothing is ever truncated.
    pub fn append(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write> Journal<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            started: Instant::now(),
        }
    }

    /// Two blank lines to set the run apart from previous output, then
    /// the title with the start timestamp.
    pub fn write_header(&mut self, title: &str) -> io::Result<()> {
        self.blank()?;
        self.blank()?;
        let started = Local::now().format("%Y-%m-%d %H:%M:%S %z");
        self.write_line(&format!("{title}, started at {started}"))
    }

    pub fn blank(&mut self) -> io::Result<()> {
        writeln!(self.sink)?;
        self.sink.flush()
    }

    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        info!("{line}");
        writeln!(self.sink, "{line}")?;
        self.sink.flush()
    }

    pub fn write_warning(&mut self, line: &str) -> io::Result<()> {
        warn!("{line}");
        writeln!(self.sink, "{line}")?;
        self.sink.flush()
    }

    pub fn write_footer(&mut self) -> io::Result<()> {
        let elapsed = self.started.elapsed();
        self.write_line(&format!("Elapsed: {elapsed:?}"))?;
        self.blank()
    }

    /// Consumes the journal and hands back the underlying writer.
    pub fn into_inner(self) -> W {
        self.sink
    }
}
