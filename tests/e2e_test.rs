/// End-to-end integration test for the compgen CLI
///
/// This test verifies the complete workflow against a live model:
/// 1. Generate a component and its unit test from a description and persist them
/// 2. List and show the persisted artifact
/// 3. Run the unit test, letting the fix loop repair it when it fails
///
/// Run with: cargo test e2e_ingest_csv --test e2e_test -- --nocapture --ignored
/// The test is marked as ignored because it requires an API key, pytest and
/// the kfp package, and takes a while to run.
use std::fs;
use std::path::Path;
use std::process::Command;

fn copy_example_assets(root_dir: &Path, work_dir: &Path) {
    let source = root_dir.join("assets").join("examples");
    let target = work_dir.join("assets").join("examples");
    fs::create_dir_all(&target).expect("Failed to create assets directory");
    for entry in fs::read_dir(&source).expect("Failed to read example assets") {
        let path = entry.expect("Failed to read asset entry").path();
        fs::copy(&path, target.join(path.file_name().unwrap())).expect("Failed to copy example asset");
    }
}

#[test]
#[ignore] // Ignore by default - requires API keys and is slow
fn e2e_ingest_csv() {
    let root_dir = std::env::current_dir().expect("Failed to get current directory");
    let work_dir = tempfile::tempdir().expect("Failed to create work directory");
    copy_example_assets(&root_dir, work_dir.path());

    println!("Root directory: {:?}", root_dir);
    println!("Work directory: {:?}", work_dir.path());

    // Step 1: Build compgen
    println!("\n=== Step 1: Building compgen ===");
    let build_status = Command::new("cargo")
        .arg("build")
        .arg("--release")
        .current_dir(&root_dir)
        .status()
        .expect("Failed to build compgen");

    assert!(build_status.success(), "Failed to build compgen");
    let compgen_bin = root_dir.join("target").join("release").join("compgen");
    assert!(compgen_bin.exists(), "compgen binary not found");
    println!("✓ compgen built successfully");

    // Step 2: Generate and persist
    println!("\n=== Step 2: Generating component ===");
    let generate_status = Command::new(&compgen_bin)
        .arg("generate")
        .arg("Write a component that reads a CSV file from a local path {csv_path: string} and returns the number of rows as an int.")
        .arg("--persist")
        .current_dir(work_dir.path())
        .status()
        .expect("Failed to run compgen generate");
    assert!(generate_status.success(), "Generation failed");

    let component_dir = work_dir.path().join("lib").join("component");
    let components: Vec<_> = fs::read_dir(&component_dir)
        .expect("Component directory not created")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(".py") && !name.starts_with("test_"))
        })
        .collect();
    assert_eq!(components.len(), 1, "Expected exactly one persisted component");

    let name = components[0]
        .file_stem()
        .and_then(|stem| stem.to_str())
        .expect("Component file has no name")
        .to_string();
    assert!(
        component_dir.join(format!("test_{}.py", name)).exists(),
        "Unit test not persisted"
    );
    assert!(
        work_dir.path().join(".compgen").join("manifest.json").exists(),
        "Manifest not written"
    );
    println!("✓ Generated component {}", name);

    // Step 3: List and show
    println!("\n=== Step 3: Listing artifacts ===");
    let list_output = Command::new(&compgen_bin)
        .arg("list")
        .current_dir(work_dir.path())
        .output()
        .expect("Failed to run compgen list");
    assert!(list_output.status.success(), "Listing failed");
    assert!(String::from_utf8_lossy(&list_output.stdout).contains(&name));

    let show_output = Command::new(&compgen_bin)
        .arg("show")
        .arg(&name)
        .current_dir(work_dir.path())
        .output()
        .expect("Failed to run compgen show");
    assert!(show_output.status.success(), "Show failed");
    assert!(String::from_utf8_lossy(&show_output.stdout).contains("Unchanged since it was persisted"));

    // Step 4: Test, fixing when needed
    println!("\n=== Step 4: Running tests ===");
    let fix_status = Command::new(&compgen_bin)
        .arg("fix")
        .arg(&name)
        .current_dir(work_dir.path())
        .status()
        .expect("Failed to run compgen fix");

    assert!(fix_status.success(), "Unit test still failing after automatic fixes");
    println!("✓ Unit test passes");
}
