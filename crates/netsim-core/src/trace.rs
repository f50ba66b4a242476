//! Trace and loss schedule loading.
//!
//! A trace file is a newline-separated list of millisecond offsets, read in
//! full at startup and validated eagerly so that a malformed trace aborts
//! the process before any link starts delivering, per [`TraceError`].

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::TraceError;

pub const SLOT_BYTES: usize = 1504;

/// An ordered sequence of delivery-slot offsets `t_0 < t_1 < … < t_{N-1}`,
/// interpreted modulo the last offset once the cursor wraps.
#[derive(Debug, Clone)]
pub struct TraceSchedule {
    offsets_ms: Vec<u64>,
}

impl TraceSchedule {
    pub fn load(path: &Path) -> Result<Self, TraceError> {
        let text = fs::read_to_string(path).map_err(|source| TraceError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut offsets_ms = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let value: i64 = trimmed.parse().map_err(|_| {
                TraceError::NonIntegerOffset(trimmed.to_string(), line_no + 1, path.to_path_buf())
            })?;
            let value = value.max(0) as u64;
            if let Some(&last) = offsets_ms.last() {
                if value <= last {
                    return Err(TraceError::NonMonotoneOffsets(line_no + 1, path.to_path_buf()));
                }
            }
            offsets_ms.push(value);
        }

        if offsets_ms.is_empty() {
            return Err(TraceError::Empty(path.to_path_buf()));
        }

        Ok(Self { offsets_ms })
    }

    pub fn offsets_ms(&self) -> &[u64] {
        &self.offsets_ms
    }

    pub fn len(&self) -> usize {
        self.offsets_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        false // validated non-empty at load time
    }

    pub fn last_offset_ms(&self) -> u64 {
        *self.offsets_ms.last().expect("validated non-empty")
    }

    /// Builds a schedule directly from already-validated offsets, for tests
    /// and for callers that compute a trace programmatically.
    pub fn load_from_offsets(offsets_ms: &[u64]) -> Self {
        Self {
            offsets_ms: offsets_ms.to_vec(),
        }
    }
}

/// An ordered sequence of `(offset_ms, probability)` pairs, interpreted as
/// piecewise-constant, right-continuous, wrapping modulo the last offset.
#[derive(Debug, Clone)]
pub struct LossSchedule {
    entries: Vec<(u64, f64)>,
}

impl LossSchedule {
    pub fn load(path: &Path) -> Result<Self, TraceError> {
        let text = fs::read_to_string(path).map_err(|source| TraceError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut entries = Vec::new();
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut parts = trimmed.splitn(2, ',');
            let (offset_str, prob_str) = match (parts.next(), parts.next()) {
                (Some(a), Some(b)) => (a.trim(), b.trim()),
                _ => {
                    return Err(TraceError::MalformedLossRow(
                        trimmed.to_string(),
                        path.to_path_buf(),
                    ))
                }
            };
            let offset: i64 = offset_str.parse().map_err(|_| {
                TraceError::MalformedLossRow(trimmed.to_string(), path.to_path_buf())
            })?;
            let probability: f64 = prob_str.parse().map_err(|_| {
                TraceError::MalformedLossRow(trimmed.to_string(), path.to_path_buf())
            })?;
            if !(0.0..=1.0).contains(&probability) {
                return Err(TraceError::ProbabilityOutOfRange(
                    probability,
                    path.to_path_buf(),
                ));
            }
            entries.push((offset.max(0) as u64, probability));
        }

        if entries.is_empty() {
            return Err(TraceError::Empty(path.to_path_buf()));
        }

        Ok(Self { entries })
    }

    /// A schedule with a single entry of constant probability `0.0`, used
    /// when a trace link is configured without a loss file.
    pub fn always_deliver() -> Self {
        Self {
            entries: vec![(0, 0.0)],
        }
    }

    pub fn entries(&self) -> &[(u64, f64)] {
        &self.entries
    }

    /// Builds a schedule directly from already-validated entries, for tests
    /// and for callers that compute a loss schedule programmatically.
    pub fn load_from_entries(entries: &[(u64, f64)]) -> Self {
        Self {
            entries: entries.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "netsim-trace-test-{}-{}.tmp",
            std::process::id(),
            rand::random::<u64>()
        ));
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_monotone_offsets() {
        let path = write_temp("0\n5\n10\n20\n");
        let schedule = TraceSchedule::load(&path).unwrap();
        assert_eq!(schedule.offsets_ms(), &[0, 5, 10, 20]);
        assert_eq!(schedule.last_offset_ms(), 20);
        fs::remove_file(path).ok();
    }

    #[test]
    fn rejects_non_monotone_offsets() {
        let path = write_temp("0\n5\n3\n");
        let err = TraceSchedule::load(&path).unwrap_err();
        assert!(matches!(err, TraceError::NonMonotoneOffsets(_, _)));
        fs::remove_file(path).ok();
    }

    #[test]
    fn rejects_empty_trace() {
        let path = write_temp("\n\n");
        let err = TraceSchedule::load(&path).unwrap_err();
        assert!(matches!(err, TraceError::Empty(_)));
        fs::remove_file(path).ok();
    }

    #[test]
    fn rejects_non_integer_offset() {
        let path = write_temp("0\nabc\n");
        let err = TraceSchedule::load(&path).unwrap_err();
        assert!(matches!(err, TraceError::NonIntegerOffset(_, _, _)));
        fs::remove_file(path).ok();
    }

    #[test]
    fn loads_loss_schedule_csv() {
        let path = write_temp("0,0.0\n1000,0.1\n2000,0.5\n");
        let schedule = LossSchedule::load(&path).unwrap();
        assert_eq!(schedule.entries().len(), 3);
        assert_eq!(schedule.entries()[1], (1000, 0.1));
        fs::remove_file(path).ok();
    }

    #[test]
    fn rejects_probability_out_of_range() {
        let path = write_temp("0,1.5\n");
        let err = LossSchedule::load(&path).unwrap_err();
        assert!(matches!(err, TraceError::ProbabilityOutOfRange(_, _)));
        fs::remove_file(path).ok();
    }
}
