use super::*;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.embedding.model_name, "nomic-embed-text-v1.5");
    assert_eq!(config.embedding.timeout_secs, 30);
    assert_eq!(config.chunking.max_tokens, 256);
    assert_eq!(config.chunking.overlap_lines, 5);
    assert_eq!(config.source.include_pattern, "**/*.cs");
    assert_eq!(config.search.limit, 10);
    assert!(config.tokenizer.prompt_prefix.is_empty());
    assert!(config.tokenizer.add_special_tokens);
}

#[test]
fn test_default_exclude_fragments() {
    let config = Config::default();
    for fragment in [".g.cs", "/obj/", "/AssemblyInfo.cs", "/packages/"] {
        assert!(
            config
                .source
                .exclude_fragments
                .contains(&fragment.to_string()),
            "missing default exclusion {}",
            fragment
        );
    }
}

#[test]
fn test_validate_valid_config() {
    let config = Config::default();
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_invalid_backend() {
    let mut config = Config::default();
    config.vector_db.backend = "invalid".to_string();
    assert!(matches!(
        config.validate(),
        Err(RagError::Config(ConfigError::InvalidValue { ref key, .. })) if key == "vector_db.backend"
    ));
}

#[test]
fn test_validate_zero_max_tokens() {
    let mut config = Config::default();
    config.chunking.max_tokens = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_zero_overlap_is_allowed() {
    let mut config = Config::default();
    config.chunking.overlap_lines = 0;
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_same_collection_names() {
    let mut config = Config::default();
    config.vector_db.chunks_collection = config.vector_db.documents_collection.clone();
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_bad_include_glob() {
    let mut config = Config::default();
    config.source.include_pattern = "src/[".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_min_score_bounds() {
    let mut config = Config::default();
    config.search.min_score = 1.5;
    assert!(config.validate().is_err());

    config.search.min_score = -0.1;
    assert!(config.validate().is_err());

    config.search.min_score = 1.0;
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_zero_limit() {
    let mut config = Config::default();
    config.search.limit = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_save_and_load() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path();

    let mut config = Config::default();
    config.chunking.max_tokens = 512;
    config.tokenizer.prompt_prefix = "task: search document | text: ".to_string();

    config.save(path).unwrap();
    let loaded = Config::from_file(path).unwrap();

    assert_eq!(loaded.chunking.max_tokens, 512);
    assert_eq!(
        loaded.tokenizer.prompt_prefix,
        "task: search document | text: "
    );
}

#[test]
fn test_save_creates_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    Config::default().save(&path).unwrap();
    assert!(path.exists());
}

#[test]
fn test_load_nonexistent_file() {
    let result = Config::from_file(Path::new("/nonexistent/config.toml"));
    assert!(matches!(
        result.unwrap_err(),
        RagError::Config(ConfigError::FileNotFound(_))
    ));
}

#[test]
fn test_from_file_invalid_toml() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "this is not [valid toml").unwrap();

    let result = Config::from_file(file.path());
    assert!(matches!(
        result.unwrap_err(),
        RagError::Config(ConfigError::ParseFailed(_))
    ));
}

#[test]
fn test_from_file_partial_config() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[chunking]\nmax_tokens = 128").unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.chunking.max_tokens, 128);
    assert_eq!(config.chunking.overlap_lines, 5);
    assert_eq!(config.search.limit, 10);
}

#[test]
fn test_from_file_validates_loaded_config() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[search]\nlimit = 0").unwrap();

    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn test_toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).unwrap();
    assert!(toml_str.contains("backend"));
    assert!(toml_str.contains("max_tokens"));
    assert!(toml_str.contains("exclude_fragments"));
}

#[test]
fn test_apply_env_overrides() {
    // Safety: these variables are only touched by this test
    unsafe {
        std::env::set_var("CSHARP_RAG_DB_BACKEND", "qdrant");
        std::env::set_var("CSHARP_RAG_MAX_TOKENS", "128");
        std::env::set_var("CSHARP_RAG_OVERLAP_LINES", "not-a-number");
        std::env::set_var("CSHARP_RAG_MIN_SCORE", "0.25");
    }

    let mut config = Config::default();
    config.apply_env_overrides();

    assert_eq!(config.vector_db.backend, "qdrant");
    assert_eq!(config.chunking.max_tokens, 128);
    // Unparseable values leave the default in place
    assert_eq!(config.chunking.overlap_lines, 5);
    assert_eq!(config.search.min_score, 0.25);

    // Safety: cleaning up the variables set above
    unsafe {
        std::env::remove_var("CSHARP_RAG_DB_BACKEND");
        std::env::remove_var("CSHARP_RAG_MAX_TOKENS");
        std::env::remove_var("CSHARP_RAG_OVERLAP_LINES");
        std::env::remove_var("CSHARP_RAG_MIN_SCORE");
    }
}
