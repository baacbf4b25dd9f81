//! Integration tests for adapter library scanning

use lorakit::library::safetensors::encode_header;
use lorakit::library::{is_adapter_file, summary, AdapterLibrary};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write_adapter(path: &Path, pairs: &[(&str, &str)], tensors: &[&str]) {
    let meta: BTreeMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, encode_header(&meta, tensors)).unwrap();
}

#[tokio::test]
async fn test_scan_multiple_roots_in_background() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    write_adapter(
        &first.path().join("styles/ink.safetensors"),
        &[
            ("ss_base_model_version", "sdxl_base_v1-0"),
            (
                "ss_tag_frequency",
                r#"{"ink":{"ink wash":12,"monochrome":4}}"#,
            ),
            ("ss_training_comment", "Ink wash illustration style"),
        ],
        &["lora_unet_down.weight"],
    );
    write_adapter(
        &second.path().join("pony/rider.SAFETENSORS"),
        &[("ss_sd_model_name", "ponyDiffusionV6XL")],
        &["lora_te_up.weight"],
    );
    std::fs::write(second.path().join("broken.safetensors"), b"\x02").unwrap();

    let library = Arc::new(AdapterLibrary::new(
        vec![first.path().to_path_buf(), second.path().to_path_buf()],
        10,
    ));
    let stats = library.scan_in_background().await.unwrap();
    assert_eq!(stats.files_scanned, 3);
    assert_eq!(stats.files_failed, 1);
    assert_eq!(library.len(), 3);

    let ink = library.by_filename("ink.safetensors").pop().unwrap();
    assert_eq!(ink.base_model.as_deref(), Some("SDXL 1.0"));
    assert_eq!(ink.trigger_words, vec!["ink wash", "monochrome"]);
    assert!(ink.styles.contains(&"Illustration".to_string()));
    assert!(summary(&ink).contains("Ink wash illustration style"));

    assert_eq!(library.search_by_base_model("pony").len(), 1);
    assert_eq!(
        library.distinct_base_models(),
        vec!["Pony".to_string(), "SDXL 1.0".to_string()]
    );

    let broken = library.by_filename("broken.safetensors").pop().unwrap();
    assert!(!broken.extraction_errors.is_empty());
    assert!(!is_adapter_file(&second.path().join("broken.safetensors")));
    assert!(is_adapter_file(&first.path().join("styles/ink.safetensors")));
}

#[test]
fn test_files_without_lora_tensors_are_not_adapters() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint.safetensors");
    write_adapter(&path, &[("base_model", "sd1.5")], &["model.diffusion.weight"]);
    assert!(!is_adapter_file(&path));
}
