//! Paths and settings.
//!
//! `AppPaths` resolves where runtime data lives (index, logs, config),
//! honoring `ESSENTIA_DATA_DIR` before the per-platform defaults.
//! `Settings` is the typed view of `config.yml`; every field has a
//! baked-in default so a missing file still yields a working process.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::errors::AgentError;

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub index_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let data_dir = discover_data_dir();
        let log_dir = data_dir.join("logs");
        let index_path = data_dir.join("index.db");

        for dir in [&data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            data_dir,
            log_dir,
            index_path,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("ESSENTIA_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        PathBuf::from("config.yml")
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_data_dir() -> PathBuf {
    if let Ok(dir) = env::var("ESSENTIA_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if cfg!(target_os = "windows") {
        let base = env::var("LOCALAPPDATA")
            .unwrap_or_else(|_| env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string()));
        return PathBuf::from(base).join("Essentia");
    }

    if cfg!(target_os = "macos") {
        return home_dir()
            .join("Library")
            .join("Application Support")
            .join("Essentia");
    }

    let xdg = env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
        home_dir()
            .join(".local/share")
            .to_string_lossy()
            .to_string()
    });
    PathBuf::from(xdg).join("essentia")
}

fn home_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrieverSettings {
    /// Chunks returned per query.
    pub k: usize,
    /// Candidate pool ranked before the diversity re-rank.
    pub fetch_k: usize,
    /// Relevance/redundancy trade-off, 1.0 = pure relevance.
    pub lambda: f32,
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self {
            k: 3,
            fetch_k: 5,
            lambda: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Corpus root; every matching document below it is indexed.
    pub docs_dir: PathBuf,
    /// Extension filter for corpus enumeration.
    pub docs_extension: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub retriever: RetrieverSettings,
    pub ollama_base_url: String,
    pub model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub num_ctx: u32,
    /// Per-request HTTP timeout for model and calendar calls.
    pub request_timeout_secs: u64,
    /// Overall budget for one model answer, streaming included.
    pub answer_timeout_secs: u64,
    /// Remote calendar API root; unset runs without a calendar.
    pub calendar_base_url: Option<String>,
    pub server_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from("docs"),
            docs_extension: "md".to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
            retriever: RetrieverSettings::default(),
            ollama_base_url: "http://localhost:11434".to_string(),
            model: "llama3.1:8b-instruct-q4_K_M".to_string(),
            embedding_model: "llama3.1:8b-instruct-q4_K_M".to_string(),
            temperature: 0.1,
            top_p: 0.9,
            num_ctx: 4096,
            request_timeout_secs: 60,
            answer_timeout_secs: 180,
            calendar_base_url: None,
            server_port: 8000,
        }
    }
}

impl Settings {
    /// Load `config.yml` if present, apply env overrides, fall back to
    /// defaults otherwise.
    pub fn load(paths: &AppPaths) -> Result<Self, AgentError> {
        let mut settings = match read_config_file(&paths.config_path())? {
            Some(parsed) => parsed,
            None => Settings::default(),
        };

        if let Ok(dir) = env::var("ESSENTIA_DOCS_DIR") {
            settings.docs_dir = PathBuf::from(dir);
        }
        if let Ok(url) = env::var("ESSENTIA_OLLAMA_URL") {
            settings.ollama_base_url = url;
        }
        if let Ok(url) = env::var("ESSENTIA_CALENDAR_URL") {
            settings.calendar_base_url = Some(url);
        }

        if settings.chunk_overlap >= settings.chunk_size {
            return Err(AgentError::BadRequest(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                settings.chunk_overlap, settings.chunk_size
            )));
        }

        Ok(settings)
    }
}

fn read_config_file(path: &Path) -> Result<Option<Settings>, AgentError> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|err| AgentError::Internal(format!("failed to read {}: {}", path.display(), err)))?;
    let parsed = serde_yaml::from_str(&raw)
        .map_err(|err| AgentError::Internal(format!("invalid config {}: {}", path.display(), err)))?;
    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.chunk_size, 1000);
        assert_eq!(settings.chunk_overlap, 200);
        assert_eq!(settings.retriever.k, 3);
        assert_eq!(settings.retriever.fetch_k, 5);
        assert!((settings.retriever.lambda - 0.5).abs() < f32::EPSILON);
        assert!((settings.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(settings.num_ctx, 4096);
    }

    #[test]
    fn partial_yaml_keeps_defaults_for_missing_fields() {
        let parsed: Settings =
            serde_yaml::from_str("docs_dir: /srv/notes\nchunk_size: 500\n").expect("valid yaml");
        assert_eq!(parsed.docs_dir, PathBuf::from("/srv/notes"));
        assert_eq!(parsed.chunk_size, 500);
        assert_eq!(parsed.chunk_overlap, 200);
        assert_eq!(parsed.retriever.k, 3);
    }
}
