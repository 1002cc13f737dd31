//! Generate / validate round trip through the facts file

use chrono::{Local, TimeZone};
use puppetconfig::core::RunContext;
use puppetconfig::machines::MachineManager;
use puppetconfig::registry::FactRegistry;
use puppetconfig::snapshot::{FACTS_SECTION, FactsDocument, Generator, SnapshotTarget, Validator};
use puppetconfig::storage::MemoryEntityStore;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn manager() -> MachineManager {
    let store = Arc::new(MemoryEntityStore::with_page_size(3));
    let ctx = RunContext::new(false, true);
    let registry = FactRegistry::new(store.clone(), ctx);
    MachineManager::new(store, registry)
}

async fn populate(machines: &MachineManager) {
    let registry = machines.registry();
    registry.add_fact("role").await.unwrap();
    registry.add_fact("env").await.unwrap();
    registry.add_fact_value("env", "prod").await.unwrap();
    registry.add_fact_value("env", "test").await.unwrap();

    for (name, role, env) in [
        ("web01", "frontend", "prod"),
        ("web02", "frontend", "test"),
        ("db01", "database", "prod"),
    ] {
        machines.add_machine(name).await.unwrap();
        machines.set_fact(name, "role", role).await.unwrap();
        machines.set_fact(name, "env", env).await.unwrap();
    }
    machines.add_machine("spare01").await.unwrap();
}

fn target(dir: &TempDir) -> SnapshotTarget {
    SnapshotTarget::new(dir.path().join("facts"), "facts.yaml")
}

#[tokio::test]
async fn test_generate_then_validate_is_clean() {
    let temp_dir = TempDir::new().unwrap();
    let machines = manager();
    populate(&machines).await;

    let target = target(&temp_dir);
    let generator = Generator::new(machines.clone(), target.clone(), RunContext::default());
    let (document, report) = generator.generate().await.unwrap();

    assert_eq!(report.path, target.path());
    assert!(report.backup.is_none());
    assert_eq!(report.machine_count, 4);
    assert_eq!(report.fact_count, 6);
    assert_eq!(document.machine("spare01").map(|f| f.len()), Some(0));

    let text = fs::read_to_string(target.path()).unwrap();
    assert!(text.starts_with(&format!("{}:", FACTS_SECTION)));
    assert_eq!(FactsDocument::from_yaml(&text).unwrap(), document);

    let validator = Validator::new(machines, RunContext::default());
    let report = validator.validate_file(&target.path()).await.unwrap();
    assert!(report.ok());
    assert!(report.errors.is_empty());
    assert_eq!(report.machines_checked, 4);
}

#[tokio::test]
async fn test_stale_document_reports_missing_machine() {
    let temp_dir = TempDir::new().unwrap();
    let machines = manager();
    machines.registry().add_fact("role").await.unwrap();
    machines.add_machine("web01").await.unwrap();
    machines.set_fact("web01", "role", "frontend").await.unwrap();

    let target = target(&temp_dir);
    let (document, _) = Generator::new(machines.clone(), target.clone(), RunContext::default())
        .generate()
        .await
        .unwrap();
    assert_eq!(document.machine("web01").and_then(|f| f.get("role")), Some("frontend"));

    machines.delete_machine("web01").await.unwrap();

    let report = Validator::new(machines, RunContext::default())
        .validate_file(&target.path())
        .await
        .unwrap();
    assert!(!report.ok());
    assert_eq!(report.errors, vec!["Machine web01 does not exist in table".to_string()]);
}

#[tokio::test]
async fn test_validate_collects_every_error() {
    let machines = manager();
    populate(&machines).await;

    let text = "\
server::facts:
  web01:
    role: frontend
    env: staging
    owner: ops
  ghost01:
    role: frontend
other::facts:
  db01:
    env: prod
";
    let document = FactsDocument::from_yaml(text).unwrap();
    let report = Validator::new(machines, RunContext::default())
        .validate_document(&document)
        .await
        .unwrap();

    assert!(!report.ok());
    assert_eq!(
        report.errors,
        vec![
            "Machine ghost01 does not exist in table".to_string(),
            "Value staging for fact env on machine web01 is invalid".to_string(),
            "Fact owner is invalid".to_string(),
        ]
    );
    assert_eq!(report.machines_checked, 3);
}

#[tokio::test]
async fn test_regenerate_keeps_backup() {
    let temp_dir = TempDir::new().unwrap();
    let machines = manager();
    populate(&machines).await;

    let target = target(&temp_dir);
    let generator = Generator::new(machines.clone(), target.clone(), RunContext::default());
    generator.generate().await.unwrap();
    let first = fs::read_to_string(target.path()).unwrap();

    machines.delete_machine("spare01").await.unwrap();
    let at = Local.with_ymd_and_hms(2024, 11, 30, 23, 59, 1).unwrap();
    let (_, report) = generator.generate_at(at).await.unwrap();

    let backup = report.backup.unwrap();
    assert_eq!(backup, temp_dir.path().join("facts").join("facts.yaml.30-11-2024-23-59-01"));
    assert_eq!(fs::read_to_string(&backup).unwrap(), first);

    let second = fs::read_to_string(target.path()).unwrap();
    assert_ne!(first, second);
    assert!(!second.contains("spare01"));
}

#[tokio::test]
async fn test_validate_missing_file_is_infrastructure_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = Validator::new(manager(), RunContext::default())
        .validate_file(&temp_dir.path().join("absent.yaml"))
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), 2);
}
