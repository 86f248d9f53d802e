use anyhow::{Context, Result};
use chrono::Utc;
use compgen::contexts::{AutoFixOutcome, Orchestrator};
use compgen::data::{ComponentName, GenerationResult, TestExecutionReport};
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use super::Config;

/// Runs the component's test and, while it fails, feeds the failure back to
/// the model, persists the proposal and reruns.
///
/// Every attempt leaves its inputs and proposals under
/// `{fixes_dir}/{timestamp}/attempt_N/`.
pub async fn fix_until_passing(
    orchestrator: &Orchestrator,
    name: &ComponentName,
    fixes_dir: &Path,
    max_attempts: usize,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut report = run_test(orchestrator, name, cancel).await?;
    if report.passed() {
        println!("✓ Tests for {} already pass: {}", name, report.summary.trim());
        return Ok(());
    }

    if config.dry_run {
        println!(
            "[DRY RUN] Tests for {} fail ({}); would attempt up to {} fix(es)",
            name,
            report.summary.trim(),
            max_attempts
        );
        return Ok(());
    }

    let session_dir = create_session_dir(fixes_dir, name)?;
    let session_dir_display = session_dir.display().to_string();
    eprintln!(
        "error[test]: {} failing ({}); attempting automatic fixes (max_attempts={}). Logs: {}",
        name,
        report.summary.trim(),
        max_attempts,
        session_dir_display
    );

    let description = orchestrator.description_of(name);

    for attempt in 1..=max_attempts {
        let attempt_dir = session_dir.join(format!("attempt_{}", attempt));
        fs::create_dir_all(&attempt_dir)
            .with_context(|| format!("Failed to create {}", attempt_dir.display()))?;

        write_attempt_test_output(&attempt_dir, &report, "")?;

        let outcome = orchestrator
            .auto_fix(name, &report.summary, &report.full_output, cancel)
            .await
            .with_context(|| format!("Failed to generate a fix for {}", name))?;

        let proposal = match outcome {
            AutoFixOutcome::Regenerated(result) => result,
            AutoFixOutcome::Unchanged(result) => {
                write_proposal(&attempt_dir, &result);
                anyhow::bail!(
                    "Model proposed no changes for {}; escalating. Logs: {}",
                    name,
                    attempt_dir.display()
                );
            }
        };
        write_proposal(&attempt_dir, &proposal);

        let proposed_name = ComponentName::from_source(&proposal.component_code)
            .context("Fixed component has no function definition")?;
        if &proposed_name != name {
            anyhow::bail!(
                "Auto-fix blocked: component renamed from {} to {}. Escalating. Logs: {}",
                name,
                proposed_name,
                attempt_dir.display()
            );
        }

        orchestrator
            .persist(
                &proposal.component_code,
                proposal.test_code.as_deref(),
                description.as_deref(),
            )
            .with_context(|| format!("Failed to persist fix for {}", name))?;
        if config.verbose {
            println!("Persisted attempt {} for {}", attempt, name);
        }

        report = run_test(orchestrator, name, cancel).await?;
        write_attempt_test_output(&attempt_dir, &report, "_after")?;
        if report.passed() {
            println!(
                "✓ Tests for {} pass after {} fix attempt(s): {}. Logs: {}",
                name,
                attempt,
                report.summary.trim(),
                session_dir_display
            );
            return Ok(());
        }
    }

    anyhow::bail!(
        "Tests for {} still failing after {} attempt(s). Escalating to human review. Logs: {}",
        name,
        max_attempts,
        session_dir_display
    );
}

async fn run_test(
    orchestrator: &Orchestrator,
    name: &ComponentName,
    cancel: &CancellationToken,
) -> Result<TestExecutionReport> {
    orchestrator
        .run_test(name, cancel)
        .await
        .with_context(|| format!("Failed to run tests for {}", name))
}

fn create_session_dir(fixes_dir: &Path, name: &ComponentName) -> Result<PathBuf> {
    let ts = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    let dir = fixes_dir.join(format!("{}_{}", ts, name));
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    Ok(dir)
}

fn write_attempt_test_output(attempt_dir: &Path, report: &TestExecutionReport, suffix: &str) -> Result<()> {
    fs::write(attempt_dir.join(format!("test_output{}.txt", suffix)), &report.full_output)
        .context("Failed to write test output")?;
    fs::write(attempt_dir.join(format!("summary{}.txt", suffix)), &report.summary)
        .context("Failed to write test summary")?;
    Ok(())
}

fn write_proposal(attempt_dir: &Path, proposal: &GenerationResult) {
    fs::write(attempt_dir.join("proposed_component.py"), &proposal.component_code).ok();
    if let Some(test_code) = &proposal.test_code {
        fs::write(attempt_dir.join("proposed_test.py"), test_code).ok();
    }
    fs::write(attempt_dir.join("review.txt"), &proposal.review_summary).ok();
}
