use compgen::data::TestVerdict;
use std::time::Instant;

/// Tallies a batch of test runs for the closing summary.
pub struct ProgressIndicator {
    total: usize,
    passed: usize,
    failed: usize,
    broken: usize,
    errored: usize,
    start_time: Instant,
}

impl ProgressIndicator {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            passed: 0,
            failed: 0,
            broken: 0,
            errored: 0,
            start_time: Instant::now(),
        }
    }

    fn done(&self) -> usize {
        self.passed + self.failed + self.broken + self.errored
    }

    pub fn start_item(&self, name: &str) {
        println!("Testing: {} ({}/{})", name, self.done() + 1, self.total);
    }

    pub fn complete_item(&mut self, verdict: TestVerdict) {
        match verdict {
            TestVerdict::Passed => self.passed += 1,
            TestVerdict::Failed => self.failed += 1,
            TestVerdict::Broken => self.broken += 1,
        }
    }

    /// The runner could not produce a report at all.
    pub fn error_item(&mut self) {
        self.errored += 1;
    }

    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }

    pub fn finish(&self) {
        let elapsed = self.start_time.elapsed();
        println!("\n{}", "=".repeat(60));
        println!("Summary:");
        println!("  Total:   {}", self.total);
        println!("  Passed:  {}", self.passed);
        println!("  Failed:  {}", self.failed);
        println!("  Broken:  {}", self.broken);
        println!("  Errors:  {}", self.errored);
        println!("  Duration:  {:.2}s", elapsed.as_secs_f64());
        println!("{}", "=".repeat(60));
    }
}
