/// Bounded count of consecutive failed attempts.
///
/// A budget of `limit` tolerates exactly `limit` failures in a row; any
/// progress starts the count over.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct RetryBudget {
    limit: u32,
    failures: u32,
}

impl RetryBudget {
    pub fn new(limit: u32) -> Self {
        Self { limit, failures: 0 }
    }

    /// Returns `true` once the budget is exhausted.
    #[must_use]
    pub fn record_failure(&mut self) -> bool {
        self.failures = self.failures.saturating_add(1);
        self.is_exhausted()
    }

    pub fn record_progress(&mut self) {
        self.failures = 0;
    }

    pub fn is_exhausted(&self) -> bool {
        self.failures >= self.limit
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::fresh(3, 0, false)]
    #[case::one_under_limit(3, 2, false)]
    #[case::at_limit(3, 3, true)]
    #[case::zero_limit(0, 0, true)]
    fn test_is_exhausted(#[case] limit: u32, #[case] failures: u32, #[case] expected: bool) {
        let budget = RetryBudget { limit, failures };
        assert_eq!(budget.is_exhausted(), expected);
    }

    #[test]
    fn exhausted_exactly_at_limit() {
        let mut budget = RetryBudget::new(3);
        assert!(!budget.record_failure());
        assert!(!budget.record_failure());
        assert!(budget.record_failure());
        assert_eq!(budget.failures(), 3);
    }

    #[test]
    fn progress_resets_failures() {
        let mut budget = RetryBudget::new(2);
        assert!(!budget.record_failure());
        budget.record_progress();
        assert!(!budget.record_failure());
        assert!(budget.record_failure());
    }
}
