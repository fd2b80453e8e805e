//! `(term, seq)` gap-detection watermark: a monotonic counter with a
//! read-only probe kept separate from the state-mutating accept, so a
//! caller can check whether an incoming event is expected before deciding
//! whether to apply it.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapWatermark {
    pub term: i64,
    pub seq: i64,
    pub row_version: i64,
}

/// Outcome of probing an incoming `tx:committed` event against the current
/// watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapCheck {
    /// `term` matches and `seq == watermark.seq + 1`: the next transaction
    /// in order, apply it directly.
    Expected,
    /// `term` advanced, or `seq` skipped ahead: a gap exists, recovery via
    /// `pullSince` is required.
    Gap,
    /// `(term, seq)` is not newer than the watermark: already observed,
    /// ignore.
    StaleOrDuplicate,
}

impl GapWatermark {
    pub fn new(term: i64, seq: i64, row_version: i64) -> Self {
        Self { term, seq, row_version }
    }

    pub fn initial() -> Self {
        Self { term: 1, seq: 0, row_version: 0 }
    }

    /// Read-only probe; does not advance the watermark.
    pub fn check(&self, term: i64, seq: i64) -> GapCheck {
        if term < self.term || (term == self.term && seq <= self.seq) {
            return GapCheck::StaleOrDuplicate;
        }
        if term == self.term && seq == self.seq + 1 {
            return GapCheck::Expected;
        }
        GapCheck::Gap
    }

    /// Advance the watermark to `(term, seq, row_version)`. Callers should
    /// only do this after `check` returned [`GapCheck::Expected`] and the
    /// event's effects have actually been applied, or after a `pullSince`
    /// recovery has caught the wrapper up.
    pub fn advance(&mut self, term: i64, seq: i64, row_version: i64) {
        self.term = term;
        self.seq = seq;
        self.row_version = self.row_version.max(row_version);
    }

    pub fn reset(&mut self, term: i64) {
        self.term = term;
        self.seq = 0;
        self.row_version = 0;
    }
}
