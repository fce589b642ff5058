use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

// -----------------------------------------------------------------------------
// Report

/// Severity of a [`ReportEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLevel {
    /// A member or step could not be produced; its slot keeps the pre-step
    /// default and the operation continues.
    Warning,
    /// The operation could not produce a usable result.
    Error,
}

impl fmt::Display for ReportLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// One structured diagnostic produced during an operation.
///
/// The path locates the affected slot in the object graph; it is
/// reconstructed from the live execution stack when the entry is recorded,
/// not stored per step.
#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub level: ReportLevel,
    pub message: String,
    pub path: String,
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at `{}`: {}", self.level, self.path, self.message)
    }
}

/// The diagnostics accumulated by one serialize or deserialize operation.
///
/// A single slot's failure never aborts its siblings; the failures collect
/// here for post-hoc inspection while the operation returns a usable,
/// partially populated result.
#[derive(Debug, Default)]
pub struct Report {
    entries: Vec<ReportEntry>,
}

impl Report {
    pub(crate) fn push(&mut self, entry: ReportEntry) {
        match entry.level {
            ReportLevel::Warning => log::warn!("{} at `{}`", entry.message, entry.path),
            ReportLevel::Error => log::error!("{} at `{}`", entry.message, entry.path),
        }
        self.entries.push(entry);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.level == ReportLevel::Warning)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}
