/// Platform-specific locations for the index, config and model cache
///
/// Follows the XDG Base Directory layout on Linux and the native locations on
/// Windows and macOS.
use std::path::PathBuf;

const APP_DIR: &str = "csharp-rag";

/// Platform-agnostic path utilities
pub struct PlatformPaths;

impl PlatformPaths {
    /// Get the appropriate data directory for the current platform
    ///
    /// - Windows: %LOCALAPPDATA%
    /// - macOS: ~/Library/Application Support
    /// - Linux/Unix: $XDG_DATA_HOME or ~/.local/share
    pub fn data_dir() -> PathBuf {
        if cfg!(target_os = "windows") {
            env_path("LOCALAPPDATA")
        } else if cfg!(target_os = "macos") {
            home_join("Library/Application Support")
        } else {
            std::env::var("XDG_DATA_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| home_join(".local/share"))
        }
    }

    /// Get the appropriate cache directory for the current platform
    ///
    /// - Windows: %LOCALAPPDATA%
    /// - macOS: ~/Library/Caches
    /// - Linux/Unix: $XDG_CACHE_HOME or ~/.cache
    pub fn cache_dir() -> PathBuf {
        if cfg!(target_os = "windows") {
            env_path("LOCALAPPDATA")
        } else if cfg!(target_os = "macos") {
            home_join("Library/Caches")
        } else {
            std::env::var("XDG_CACHE_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| home_join(".cache"))
        }
    }

    /// Get the appropriate config directory for the current platform
    ///
    /// - Windows: %APPDATA%
    /// - macOS: ~/Library/Application Support
    /// - Linux/Unix: $XDG_CONFIG_HOME or ~/.config
    pub fn config_dir() -> PathBuf {
        if cfg!(target_os = "windows") {
            env_path("APPDATA")
        } else if cfg!(target_os = "macos") {
            home_join("Library/Application Support")
        } else {
            std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| home_join(".config"))
        }
    }

    /// Returns: {data_dir}/csharp-rag
    pub fn project_data_dir() -> PathBuf {
        Self::data_dir().join(APP_DIR)
    }

    /// Returns: {cache_dir}/csharp-rag
    pub fn project_cache_dir() -> PathBuf {
        Self::cache_dir().join(APP_DIR)
    }

    /// Returns: {config_dir}/csharp-rag
    pub fn project_config_dir() -> PathBuf {
        Self::config_dir().join(APP_DIR)
    }

    /// Get default LanceDB database path
    ///
    /// Returns: {data_dir}/csharp-rag/lancedb
    pub fn default_lancedb_path() -> PathBuf {
        Self::project_data_dir().join("lancedb")
    }

    /// Directory where FastEmbed stores downloaded model files
    ///
    /// Returns: {cache_dir}/csharp-rag/models
    pub fn default_model_cache_dir() -> PathBuf {
        Self::project_cache_dir().join("models")
    }

    /// Get default tokenizer vocabulary path
    ///
    /// Returns: {data_dir}/csharp-rag/tokenizer.json
    pub fn default_vocab_path() -> PathBuf {
        Self::project_data_dir().join("tokenizer.json")
    }

    /// Get default config file path
    ///
    /// Returns: {config_dir}/csharp-rag/config.toml
    pub fn default_config_path() -> PathBuf {
        Self::project_config_dir().join("config.toml")
    }
}

fn env_path(var: &str) -> PathBuf {
    std::env::var(var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

fn home_join(rel: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|home| PathBuf::from(home).join(rel))
        .unwrap_or_else(|_| PathBuf::from("."))
}
