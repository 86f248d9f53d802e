use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod auto_fix;
mod progress;

use compgen::config::Settings;
use compgen::contexts::{
    ArtifactStore, ExecutionBridge, GenerationFailure, ModelHandle, OpenAiChatModel, Orchestrator,
    PromptSet,
};
use compgen::data::{ArtifactKind, ComponentName, GenerationRequest, GenerationResult};
use compgen::manifest::Manifest;
use compgen::prompts::SAMPLE_DESCRIPTIONS;
use compgen::registries::{
    FileModelRegistry, FilePromptRegistry, ModelRole, PromptName, PromptRegistry, load_examples,
};
use progress::ProgressIndicator;

#[derive(Clone, Copy)]
pub struct Config {
    pub verbose: bool,
    pub dry_run: bool,
}

/// Where a generation request's description comes from
pub enum DescriptionSource {
    Text(Option<String>),
    File(PathBuf),
}

pub struct GenerateOptions {
    pub also_generate_test: bool,
    pub persist: bool,
    pub candidates: usize,
}

fn prompt_registry(settings: &Settings) -> FilePromptRegistry {
    FilePromptRegistry::new(Some(settings.prompts_dir.clone()))
        .with_review_override(settings.review_prompt_path())
}

fn load_prompts(settings: &Settings) -> Result<PromptSet> {
    let examples = load_examples(Path::new("."), &settings.examples)
        .context("Failed to load example components")?;
    PromptSet::load(&prompt_registry(settings), examples).context("Failed to load prompts")
}

/// Wires the orchestrator from settings.
///
/// Commands that never call the model may run without an API key.
fn build_orchestrator(settings: &Settings, needs_model: bool, config: &Config) -> Result<Orchestrator> {
    let api_key = match settings.api_key() {
        Ok(key) => key,
        Err(_) if !needs_model => String::new(),
        Err(e) => return Err(e).context("Model access is not configured"),
    };

    let models = FileModelRegistry::new(Some(settings.model_registry_path()), settings.model_name());
    let generation = models
        .get_model(ModelRole::Generation)
        .context("Failed to resolve generation model")?;
    let review = models
        .get_model(ModelRole::Review)
        .context("Failed to resolve review model")?;

    if config.verbose {
        println!(
            "Using model {} (temperature {}) for generation and {} (temperature {}) for review",
            generation.model, generation.temperature, review.model, review.temperature
        );
    }

    let generation = ModelHandle::new(
        Arc::new(OpenAiChatModel::new(&api_key, &settings.api_base_url, &generation.model)),
        generation.temperature,
        settings.model_timeout(),
    );
    let review = ModelHandle::new(
        Arc::new(OpenAiChatModel::new(&api_key, &settings.api_base_url, &review.model)),
        review.temperature,
        settings.model_timeout(),
    );

    let store = ArtifactStore::new(&settings.artifact_root);
    let bridge = ExecutionBridge::new(store.clone(), &settings.test_runner, settings.test_timeout());
    let manifest = Manifest::load(&settings.state_dir).context("Failed to load artifact manifest")?;

    Ok(Orchestrator::new(
        generation,
        review,
        load_prompts(settings)?,
        store,
        bridge,
        manifest,
    ))
}

pub async fn generate(
    source: DescriptionSource,
    options: GenerateOptions,
    settings: &Settings,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<()> {
    let description = match source {
        DescriptionSource::Text(text) => text.unwrap_or_default(),
        DescriptionSource::File(path) => fs::read_to_string(&path)
            .with_context(|| format!("Failed to read description from {}", path.display()))?,
    };
    let request = GenerationRequest::new(description, options.also_generate_test);

    if config.dry_run {
        let prompts = load_prompts(settings)?;
        println!("[DRY RUN] Would send the following conversation:");
        println!("--- system ---\n{}", prompts.system_context());
        println!("--- user ---\n{}", request.description);
        if options.candidates > 1 {
            println!("[DRY RUN] {} candidates would be generated and reviewed together", options.candidates);
        }
        return Ok(());
    }

    let orchestrator = build_orchestrator(settings, !request.is_empty(), config)?;

    let result = if options.candidates > 1 && !request.is_empty() {
        let best = orchestrator
            .generate_best_of(&request, options.candidates, cancel)
            .await
            .map_err(report_partial)?;
        match &best.records {
            Ok(records) => {
                println!("## Candidate scores");
                for record in records {
                    println!(
                        "  snippet {}: {}% {}",
                        record.snippet_name, record.accuracy_score, record.accuracy_summary
                    );
                }
            }
            Err(e) => eprintln!("Could not read candidate scores ({}); kept the first candidate", e),
        }
        println!(
            "Selected candidate {} of {}\n",
            best.chosen + 1,
            best.candidates.len()
        );
        best.result
    } else {
        orchestrator
            .generate(&request, cancel)
            .await
            .map_err(report_partial)?
    };

    print_result(&result);

    if options.persist {
        if result.is_placeholder() {
            println!("Nothing to persist for an empty description");
            return Ok(());
        }
        let name = orchestrator
            .persist(
                &result.component_code,
                result.test_code.as_deref(),
                Some(request.description.as_str()),
            )
            .context("Failed to persist generated component")?;
        println!(
            "✓ Persisted {} to {}",
            name,
            orchestrator.store().component_path(&name).display()
        );
    }

    Ok(())
}

/// Prints whatever a failed cycle produced before handing the error on.
fn report_partial(failure: GenerationFailure) -> anyhow::Error {
    if let Some(code) = &failure.partial.component_code {
        eprintln!("Partial component before the failure:\n{}", code);
    }
    if let Some(test) = &failure.partial.test_code {
        eprintln!("Partial test before the failure:\n{}", test);
    }
    anyhow::Error::new(failure)
}

fn print_result(result: &GenerationResult) {
    println!("## Component\n{}", result.component_code);
    if let Some(test_code) = &result.test_code {
        println!("## Unit test\n{}", test_code);
    }
    println!("## Review\n{}", result.review_summary);
}

pub fn examples(settings: &Settings) -> Result<()> {
    println!("Sample requests:");
    for (idx, description) in SAMPLE_DESCRIPTIONS.iter().enumerate() {
        println!("  {}. {}", idx + 1, description);
    }
    println!("\nExample components shown to the model:");
    for example in &settings.examples {
        println!("  {} ({})", example.description, example.path.display());
    }
    Ok(())
}

pub fn persist(
    component: PathBuf,
    test: Option<PathBuf>,
    description: Option<String>,
    settings: &Settings,
    config: &Config,
) -> Result<()> {
    let component_code = fs::read_to_string(&component)
        .with_context(|| format!("Failed to read {}", component.display()))?;
    let test_code = test
        .map(|path| {
            fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))
        })
        .transpose()?;

    if config.dry_run {
        let name = ComponentName::from_source(&component_code)
            .with_context(|| format!("Cannot derive a component name from {}", component.display()))?;
        let store = ArtifactStore::new(&settings.artifact_root);
        println!("[DRY RUN] Would write {}", store.component_path(&name).display());
        if test_code.is_some() {
            println!("[DRY RUN] Would write {}", store.test_path(&name).display());
        }
        return Ok(());
    }

    let orchestrator = build_orchestrator(settings, false, config)?;
    let name = orchestrator
        .persist(&component_code, test_code.as_deref(), description.as_deref())
        .with_context(|| format!("Failed to persist {}", component.display()))?;
    println!("✓ Persisted {}", name);
    Ok(())
}

pub fn show(name: &str, settings: &Settings, config: &Config) -> Result<()> {
    let name = parse_name(name)?;
    let orchestrator = build_orchestrator(settings, false, config)?;
    let artifact = orchestrator
        .load(&name)
        .with_context(|| format!("Failed to load {}", name))?;

    println!("## {}\n{}", name.component_file_name(), artifact.component_code);
    match &artifact.test_code {
        Some(test_code) => println!("## {}\n{}", name.test_file_name(), test_code),
        None => println!("(no test persisted)"),
    }

    match orchestrator.edit_status(&artifact) {
        Some(status) if status.any() => {
            if status.component_edited {
                println!("Component edited since it was persisted");
            }
            if status.test_edited {
                println!("Test edited since it was persisted");
            }
        }
        Some(_) => println!("Unchanged since it was persisted"),
        None => println!("Not recorded in the manifest"),
    }
    if let Some(description) = orchestrator.description_of(&name) {
        println!("Requested as: {}", description);
    }
    Ok(())
}

pub fn list(tests: bool, settings: &Settings, config: &Config) -> Result<()> {
    let kind = if tests { ArtifactKind::Test } else { ArtifactKind::Component };
    let orchestrator = build_orchestrator(settings, false, config)?;
    let names = orchestrator
        .list_available(kind)
        .context("Failed to list artifacts")?;

    if names.is_empty() {
        println!("No artifacts found in {}", settings.artifact_root.display());
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

pub async fn test(
    names: Vec<String>,
    all: bool,
    settings: &Settings,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<()> {
    let orchestrator = build_orchestrator(settings, false, config)?;

    let names = if all {
        orchestrator
            .list_available(ArtifactKind::Component)
            .context("Failed to list artifacts")?
    } else {
        names
    };
    if names.is_empty() {
        println!("No components to test");
        return Ok(());
    }

    let names = names
        .iter()
        .map(|name| parse_name(name))
        .collect::<Result<Vec<_>>>()?;

    if config.dry_run {
        for name in &names {
            println!(
                "[DRY RUN] Would run {} {}",
                settings.test_runner,
                orchestrator.store().test_path(name).display()
            );
        }
        return Ok(());
    }

    let mut progress = ProgressIndicator::new(names.len());
    for name in &names {
        progress.start_item(name.as_str());
        match orchestrator.run_test(name, cancel).await {
            Ok(report) => {
                let marker = if report.passed() { "✓" } else { "✗" };
                println!("{} {}: {}", marker, name, report.summary.trim());
                if config.verbose || (!report.passed() && !report.summary_found) {
                    println!("{}", report.full_output);
                }
                progress.complete_item(report.verdict());
            }
            Err(e) => {
                eprintln!("✗ Failed to run tests for {}: {}", name, e);
                progress.error_item();
            }
        }
    }

    if names.len() > 1 {
        progress.finish();
    }
    if !progress.all_passed() {
        anyhow::bail!("Not all test runs passed");
    }
    Ok(())
}

pub async fn fix(
    name: &str,
    max_attempts: Option<usize>,
    settings: &Settings,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<()> {
    let name = parse_name(name)?;
    let orchestrator = build_orchestrator(settings, !config.dry_run, config)?;
    auto_fix::fix_until_passing(
        &orchestrator,
        &name,
        &settings.fixes_dir(),
        max_attempts.unwrap_or(settings.max_fix_attempts).max(1),
        config,
        cancel,
    )
    .await
}

pub fn review_prompt_show(settings: &Settings) -> Result<()> {
    let prompt = prompt_registry(settings)
        .get_prompt(PromptName::Review)
        .context("Failed to load review prompt")?;
    println!("{}", prompt);
    Ok(())
}

pub fn review_prompt_set(file: PathBuf, settings: &Settings, config: &Config) -> Result<()> {
    let prompt = fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    if prompt.trim().is_empty() {
        anyhow::bail!("Review prompt in {} is empty", file.display());
    }

    let target = settings.review_prompt_path();
    if config.dry_run {
        println!("[DRY RUN] Would write review prompt to {}", target.display());
        return Ok(());
    }

    fs::create_dir_all(&settings.state_dir)
        .with_context(|| format!("Failed to create {}", settings.state_dir.display()))?;
    fs::write(&target, prompt).with_context(|| format!("Failed to write {}", target.display()))?;
    println!("✓ Review prompt updated; later reviews use {}", target.display());
    Ok(())
}

pub fn review_prompt_reset(settings: &Settings, config: &Config) -> Result<()> {
    let target = settings.review_prompt_path();
    if !target.exists() {
        println!("Review prompt is already the default");
        return Ok(());
    }
    if config.dry_run {
        println!("[DRY RUN] Would remove {}", target.display());
        return Ok(());
    }
    fs::remove_file(&target).with_context(|| format!("Failed to remove {}", target.display()))?;
    println!("✓ Review prompt reset to the default");
    Ok(())
}

fn parse_name(name: &str) -> Result<ComponentName> {
    ComponentName::parse(name).with_context(|| format!("'{}' is not a valid component name", name))
}
