use super::artifact_store::ArtifactStore;
use crate::data::{ComponentName, TestExecutionReport};
use regex::Regex;
use std::io;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Flag passed to the test runner after the test file.
pub const SUPPRESS_WARNINGS_FLAG: &str = "--disable-warnings";

/// Errors raised while running a persisted test
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("no persisted test for component '{0}'")]
    ArtifactNotFound(ComponentName),

    #[error("could not start test runner '{runner}': {source}")]
    ExecutionUnavailable {
        runner: String,
        #[source]
        source: io::Error,
    },

    #[error("test run did not finish within {seconds}s")]
    ExecutionTimeout { seconds: u64 },

    #[error("test run was cancelled")]
    Cancelled,

    #[error("test runner produced no output (exit code {exit_code:?})")]
    NoOutput { exit_code: Option<i32> },
}

fn delimiter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"={3,}").expect("valid regex"))
}

/// Runs persisted tests in a child process and reads the runner's tally.
#[derive(Debug, Clone)]
pub struct ExecutionBridge {
    store: ArtifactStore,
    runner: String,
    timeout: Duration,
}

impl ExecutionBridge {
    /// Creates a new ExecutionBridge
    ///
    /// # Arguments
    /// * `store` - Where test artifacts are looked up
    /// * `runner` - Test runner executable, e.g. "pytest"
    /// * `timeout` - Upper bound on one test run
    pub fn new(store: ArtifactStore, runner: impl Into<String>, timeout: Duration) -> Self {
        Self {
            store,
            runner: runner.into(),
            timeout,
        }
    }

    /// Runs `test_{name}` as `<runner> <path> --disable-warnings`.
    ///
    /// `full_output` is stdout followed by stderr. A non-zero exit is not an
    /// error here; see [`TestExecutionReport::verdict`].
    pub async fn run_test(
        &self,
        name: &ComponentName,
        cancel: &CancellationToken,
    ) -> Result<TestExecutionReport, ExecutionError> {
        let test_path = self.store.test_path(name);
        if !test_path.is_file() {
            return Err(ExecutionError::ArtifactNotFound(name.clone()));
        }

        let mut command = Command::new(&self.runner);
        command
            .arg(&test_path)
            .arg(SUPPRESS_WARNINGS_FLAG)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("running {} {:?} {}", self.runner, test_path, SUPPRESS_WARNINGS_FLAG);
        let child = command
            .spawn()
            .map_err(|source| ExecutionError::ExecutionUnavailable {
                runner: self.runner.clone(),
                source,
            })?;

        // Dropping the wait future drops the child, which kills it.
        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExecutionError::Cancelled),
            waited = tokio::time::timeout(self.timeout, child.wait_with_output()) => match waited {
                Err(_) => {
                    return Err(ExecutionError::ExecutionTimeout {
                        seconds: self.timeout.as_secs(),
                    })
                }
                Ok(result) => result.map_err(|source| ExecutionError::ExecutionUnavailable {
                    runner: self.runner.clone(),
                    source,
                })?,
            },
        };

        let mut full_output = String::from_utf8_lossy(&output.stdout).into_owned();
        full_output.push_str(&String::from_utf8_lossy(&output.stderr));
        let exit_code = output.status.code();

        if full_output.trim().is_empty() {
            return Err(ExecutionError::NoOutput { exit_code });
        }

        let (summary, summary_found) = summarize(&full_output);
        info!(component = %name, ?exit_code, "test run finished");

        Ok(TestExecutionReport {
            summary,
            full_output,
            exit_code,
            summary_found,
        })
    }
}

/// Returns the second-to-last segment between `===` delimiter runs and
/// whether a delimiter was present at all. Without one the whole output is
/// the summary.
pub fn summarize(full_output: &str) -> (String, bool) {
    let segments: Vec<&str> = delimiter_re().split(full_output).collect();
    if segments.len() < 2 {
        return (full_output.to_string(), false);
    }
    (segments[segments.len() - 2].to_string(), true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TestVerdict;
    use std::fs;
    use tempfile::TempDir;

    fn bridge_with_script(script: &str, timeout: Duration) -> (TempDir, ExecutionBridge, ComponentName) {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let name = ComponentName::parse("ingest_csv").unwrap();
        fs::write(store.test_path(&name), script).unwrap();
        // `sh <file> --disable-warnings` runs the file as a shell script
        let bridge = ExecutionBridge::new(store, "sh", timeout);
        (dir, bridge, name)
    }

    #[test]
    fn test_summarize_takes_second_to_last_segment() {
        let output = "============ test session starts ============\ncollected 1 item\n\ntest_x.py .\n\n============ 1 passed in 0.01s ============\n";
        let (summary, found) = summarize(output);
        assert!(found);
        assert_eq!(summary, " 1 passed in 0.01s ");
    }

    #[test]
    fn test_summarize_without_delimiter() {
        let (summary, found) = summarize("Traceback: boom");
        assert!(!found);
        assert_eq!(summary, "Traceback: boom");
    }

    #[test]
    fn test_summarize_ignores_short_runs() {
        let (summary, found) = summarize("a == b");
        assert!(!found);
        assert_eq!(summary, "a == b");
    }

    #[tokio::test]
    async fn test_run_passing_test() {
        let (_dir, bridge, name) = bridge_with_script(
            "echo '===== test session starts ====='\necho '===== 1 passed in 0.01s ====='\n",
            Duration::from_secs(10),
        );

        let report = bridge.run_test(&name, &CancellationToken::new()).await.unwrap();
        assert_eq!(report.summary, " 1 passed in 0.01s ");
        assert_eq!(report.exit_code, Some(0));
        assert_eq!(report.verdict(), TestVerdict::Passed);
    }

    #[tokio::test]
    async fn test_runner_receives_warning_flag() {
        let (_dir, bridge, name) = bridge_with_script("echo \"args: $1\"\n", Duration::from_secs(10));

        let report = bridge.run_test(&name, &CancellationToken::new()).await.unwrap();
        assert_eq!(report.full_output, "args: --disable-warnings\n");
        assert!(!report.summary_found);
    }

    #[tokio::test]
    async fn test_stderr_follows_stdout() {
        let (_dir, bridge, name) = bridge_with_script(
            "echo '=== 1 failed ==='\necho 'E assert 1 == 2' >&2\nexit 1\n",
            Duration::from_secs(10),
        );

        let report = bridge.run_test(&name, &CancellationToken::new()).await.unwrap();
        assert_eq!(report.full_output, "=== 1 failed ===\nE assert 1 == 2\n");
        assert_eq!(report.verdict(), TestVerdict::Failed);
    }

    #[tokio::test]
    async fn test_crash_without_summary_is_broken() {
        let (_dir, bridge, name) = bridge_with_script("echo 'ImportError: no module'\nexit 4\n", Duration::from_secs(10));

        let report = bridge.run_test(&name, &CancellationToken::new()).await.unwrap();
        assert_eq!(report.summary, report.full_output);
        assert_eq!(report.verdict(), TestVerdict::Broken);
    }

    #[tokio::test]
    async fn test_no_output_is_error() {
        let (_dir, bridge, name) = bridge_with_script("exit 0\n", Duration::from_secs(10));

        let result = bridge.run_test(&name, &CancellationToken::new()).await;
        assert!(matches!(result, Err(ExecutionError::NoOutput { exit_code: Some(0) })));
    }

    #[tokio::test]
    async fn test_missing_test_artifact() {
        let dir = TempDir::new().unwrap();
        let bridge = ExecutionBridge::new(ArtifactStore::new(dir.path()), "sh", Duration::from_secs(10));
        let name = ComponentName::parse("absent").unwrap();

        let result = bridge.run_test(&name, &CancellationToken::new()).await;
        assert!(matches!(result, Err(ExecutionError::ArtifactNotFound(n)) if n == name));
    }

    #[tokio::test]
    async fn test_unavailable_runner() {
        let (dir, _bridge, name) = bridge_with_script("echo hi\n", Duration::from_secs(10));
        let bridge = ExecutionBridge::new(
            ArtifactStore::new(dir.path()),
            "compgen-no-such-runner",
            Duration::from_secs(10),
        );

        let result = bridge.run_test(&name, &CancellationToken::new()).await;
        assert!(matches!(result, Err(ExecutionError::ExecutionUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_timeout_kills_run() {
        let (_dir, bridge, name) = bridge_with_script("sleep 30\n", Duration::from_millis(100));

        let result = bridge.run_test(&name, &CancellationToken::new()).await;
        assert!(matches!(result, Err(ExecutionError::ExecutionTimeout { seconds: 0 })));
    }

    #[tokio::test]
    async fn test_cancelled_run() {
        let (_dir, bridge, name) = bridge_with_script("sleep 30\n", Duration::from_secs(60));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = bridge.run_test(&name, &cancel).await;
        assert!(matches!(result, Err(ExecutionError::Cancelled)));
    }
}
