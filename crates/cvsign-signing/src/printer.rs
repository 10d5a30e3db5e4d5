//! # Progress Printers
//!
//! The walk reports one line per processed element. Nested component
//! versions print through [`Printer::add_gap`] so their lines are
//! indented below the referencing version.

use parking_lot::Mutex;

/// Line-oriented progress output.
pub trait Printer: Send + Sync {
    fn print(&self, line: &str);

    /// A printer that prefixes every line with `gap`.
    fn add_gap(&self, gap: &str) -> Box<dyn Printer + '_>;
}

/// Prefixes lines and forwards to an inner printer.
pub struct Gapped<'a> {
    inner: &'a dyn Printer,
    gap: String,
}

impl<'a> Gapped<'a> {
    pub fn new(inner: &'a dyn Printer, gap: &str) -> Self {
        Self {
            inner,
            gap: gap.to_string(),
        }
    }
}

impl Printer for Gapped<'_> {
    fn print(&self, line: &str) {
        self.inner.print(&format!("{}{}", self.gap, line));
    }

    fn add_gap(&self, gap: &str) -> Box<dyn Printer + '_> {
        Box::new(Gapped::new(self, gap))
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPrinter;

impl Printer for NullPrinter {
    fn print(&self, _line: &str) {}

    fn add_gap(&self, _gap: &str) -> Box<dyn Printer + '_> {
        Box::new(NullPrinter)
    }
}

/// Emits each line as a `tracing` info event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPrinter;

impl Printer for TracingPrinter {
    fn print(&self, line: &str) {
        tracing::info!(target: "cvsign::printer", "{line}");
    }

    fn add_gap(&self, gap: &str) -> Box<dyn Printer + '_> {
        Box::new(Gapped::new(self, gap))
    }
}

/// Collects lines in memory.
#[derive(Debug, Default)]
pub struct BufferPrinter {
    lines: Mutex<Vec<String>>,
}

impl BufferPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// All lines joined with newlines.
    pub fn text(&self) -> String {
        self.lines.lock().join("\n")
    }
}

impl Printer for BufferPrinter {
    fn print(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }

    fn add_gap(&self, gap: &str) -> Box<dyn Printer + '_> {
        Box::new(Gapped::new(self, gap))
    }
}
