//! Registry and machine state persisted through the file store

use futures::TryStreamExt;
use puppetconfig::core::RunContext;
use puppetconfig::machines::MachineManager;
use puppetconfig::registry::FactRegistry;
use puppetconfig::storage::{EntityStore, FileEntityStore};
use std::sync::Arc;
use tempfile::TempDir;

fn open(path: &std::path::Path) -> MachineManager {
    let store: Arc<dyn EntityStore> = Arc::new(FileEntityStore::open(path).unwrap());
    let registry = FactRegistry::new(store.clone(), RunContext::default());
    MachineManager::new(store, registry)
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state").join("store.json");

    {
        let machines = open(&path);
        let registry = machines.registry();
        registry.add_fact("env").await.unwrap();
        registry.add_fact_value("env", "prod").await.unwrap();
        machines.add_machine("web01").await.unwrap();
        machines.set_fact("web01", "env", "prod").await.unwrap();
    }
    assert!(path.exists());

    let machines = open(&path);
    let registry = machines.registry();
    assert!(registry.fact_has_enumerated_values("env").await.unwrap());
    assert!(registry.value_is_valid("env", "prod").await.unwrap());
    assert_eq!(machines.get_facts("web01").await.unwrap().get("env"), Some("prod"));

    let names: Vec<String> = machines.list_machines().try_collect().await.unwrap();
    assert_eq!(names, vec!["web01".to_string()]);
}

#[tokio::test]
async fn test_failed_mutation_does_not_touch_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store.json");

    let machines = open(&path);
    machines.add_machine("web01").await.unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    assert!(machines.add_machine("web01").await.is_err());
    assert!(machines.delete_machine("db01").await.is_err());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[tokio::test]
async fn test_corrupt_file_is_infrastructure_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store.json");
    std::fs::write(&path, "{not json").unwrap();

    let err = FileEntityStore::open(&path).err().unwrap();
    assert_eq!(err.exit_code(), 2);
}
