//! Rule counters for a run.

/// Counts of rules seen and rules that failed to parse.
///
/// Each unit of work keeps its own counters; the pipeline merges them once
/// every unit has finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleMetrics {
    all: u64,
    parsing_fail: u64,
}

impl RuleMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rule taken from a page.
    pub fn inc_all(&mut self) {
        self.all += 1;
    }

    /// Record a rule that was skipped because it could not be parsed.
    pub fn inc_parsing_fail(&mut self) {
        self.parsing_fail += 1;
    }

    /// Add another set of counters to this one.
    pub fn merge(&mut self, other: RuleMetrics) {
        self.all += other.all;
        self.parsing_fail += other.parsing_fail;
    }

    #[must_use]
    pub fn all(&self) -> u64 {
        self.all
    }

    #[must_use]
    pub fn parsing_fail(&self) -> u64 {
        self.parsing_fail
    }

    /// Rules that made it into the output.
    #[must_use]
    pub fn parsed(&self) -> u64 {
        self.all - self.parsing_fail
    }

    /// Emit the final totals.
    pub fn log_metrics(&self) {
        tracing::info!("All rules {} rules", self.all);
        tracing::info!("Failed to parse {} rules", self.parsing_fail);
    }
}
