use super::*;

fn sample_chunk() -> Chunk {
    Chunk {
        id: Uuid::now_v7(),
        document_id: Uuid::now_v7(),
        namespace: "Acme.Billing".to_string(),
        type_name: "InvoiceService".to_string(),
        method_name: Some("Issue".to_string()),
        snippet: "public void Issue() {}".to_string(),
        token_count: 7,
        embedding: vec![0.1, 0.2, 0.3],
        oversized: false,
    }
}

#[test]
fn test_document_new_assigns_fresh_ids() {
    let a = Document::new("src/A.cs", "abc");
    let b = Document::new("src/A.cs", "abc");
    assert_ne!(a.id, b.id);
    assert_eq!(a.relative_path, "src/A.cs");
    assert_eq!(a.content_hash, "abc");
    assert!(a.indexed_at > 0);
}

#[test]
fn test_document_ids_are_time_ordered() {
    let first = Document::new("a.cs", "1");
    let second = Document::new("b.cs", "2");
    assert!(first.id <= second.id);
    assert_eq!(first.id.get_version_num(), 7);
}

#[test]
fn test_chunk_serialization_keeps_context_labels() {
    let chunk = sample_chunk();
    let json = serde_json::to_string(&chunk).unwrap();
    let back: Chunk = serde_json::from_str(&json).unwrap();
    assert_eq!(back, chunk);
}

#[test]
fn test_chunk_oversized_defaults_to_false() {
    let chunk = sample_chunk();
    let mut value = serde_json::to_value(&chunk).unwrap();
    value.as_object_mut().unwrap().remove("oversized");
    let back: Chunk = serde_json::from_value(value).unwrap();
    assert!(!back.oversized);
}

#[test]
fn test_progress_fraction() {
    let progress = IngestionProgress {
        processed: 3,
        total: 4,
        errors: 1,
        relative_path: "x.cs".to_string(),
    };
    assert!((progress.fraction() - 0.75).abs() < f64::EPSILON);

    let empty = IngestionProgress {
        processed: 0,
        total: 0,
        errors: 0,
        relative_path: String::new(),
    };
    assert_eq!(empty.fraction(), 1.0);
}

#[test]
fn test_report_processed_excludes_unchanged() {
    let report = IngestionReport {
        succeeded: 2,
        failed: 1,
        deleted: 3,
        unchanged: 10,
        ..Default::default()
    };
    assert_eq!(report.processed(), 6);
}
