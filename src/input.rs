use std::io::{self, BufRead};

const FIELD_SEPARATORS: [char; 4] = [' ', '\t', ',', ';'];

/// One non-skipped input line, split into fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRecord {
    /// 1-based physical line number, used only in diagnostics.
    pub line_no: u64,
    pub fields: Vec<String>,
}

/// Reads instruction lines from a text source.
///
/// Lines are trimmed; empty lines and lines starting with `#` are
/// counted as skipped and never surface to the caller. Fields are split
/// on space, tab, comma or semicolon, with empty fields dropped.
///
/// Counters cover every physical line consumed, so a single forward
/// pass yields the totals needed for the run trailer. The reader is not
/// restartable; create a fresh one per file pass.
pub struct LineReader<R> {
    source: R,
    total_lines: u64,
    skipped_lines: u64,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            total_lines: 0,
            skipped_lines: 0,
        }
    }

    /// Every physical line consumed so far, skipped ones included.
    pub fn total_lines(&self) -> u64 {
        self.total_lines
    }

    pub fn skipped_lines(&self) -> u64 {
        self.skipped_lines
    }

    /// Next instruction record, or `None` at end of input.
    pub fn next_record(&mut self) -> io::Result<Option<LineRecord>> {
        let mut buf = String::new();
        loop {
            buf.clear();
            if self.source.read_line(&mut buf)? == 0 {
                return Ok(None);
            }
            self.total_lines += 1;

            let line = buf.trim();
            if line.is_empty() || line.starts_with('#') {
                self.skipped_lines += 1;
                continue;
            }

            let fields = line
                .split(&FIELD_SEPARATORS[..])
                .filter(|f| !f.is_empty())
                .map(ToOwned::to_owned)
                .collect();
            return Ok(Some(LineRecord {
                line_no: self.total_lines,
                fields,
            }));
        }
    }
}
