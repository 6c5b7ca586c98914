use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    pub server: ServerConfig,
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_target_chars")]
    pub target_chars: usize,
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    #[serde(default = "default_overlap_paragraphs")]
    pub overlap_paragraphs: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_chars: default_target_chars(),
            min_chars: default_min_chars(),
            overlap_paragraphs: default_overlap_paragraphs(),
        }
    }
}

fn default_target_chars() -> usize {
    900
}
fn default_min_chars() -> usize {
    200
}
fn default_overlap_paragraphs() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Weight of the semantic signal in hybrid fusion; the keyword signal
    /// gets `1 - hybrid_alpha`.
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f64,
    #[serde(default = "default_candidate_k")]
    pub candidate_k_vector: i64,
    #[serde(default = "default_candidate_k")]
    pub candidate_k_keyword: i64,
    #[serde(default = "default_answer_top_k")]
    pub answer_top_k: i64,
    /// Minimum fused score of the top hit required to produce an answer.
    /// Calibrated against the normalized [0, 1] fused-score scale; re-tune
    /// if the fusion formula changes.
    #[serde(default = "default_abstain_threshold")]
    pub abstain_threshold: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            hybrid_alpha: default_hybrid_alpha(),
            candidate_k_vector: default_candidate_k(),
            candidate_k_keyword: default_candidate_k(),
            answer_top_k: default_answer_top_k(),
            abstain_threshold: default_abstain_threshold(),
        }
    }
}

fn default_hybrid_alpha() -> f64 {
    0.7
}
fn default_candidate_k() -> i64 {
    30
}
fn default_answer_top_k() -> i64 {
    4
}
fn default_abstain_threshold() -> f64 {
    0.28
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Manifest listing the corpus: `[{title, url, file_name}, ...]`.
    pub sources_json: PathBuf,
    /// Directory containing the source PDF files named in the manifest.
    pub raw_dir: PathBuf,
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.target_chars == 0 {
        anyhow::bail!("chunking.target_chars must be > 0");
    }
    if config.chunking.min_chars > config.chunking.target_chars {
        anyhow::bail!("chunking.min_chars must be <= chunking.target_chars");
    }

    // Validate retrieval
    if !(0.0..=1.0).contains(&config.retrieval.hybrid_alpha) {
        anyhow::bail!("retrieval.hybrid_alpha must be in [0.0, 1.0]");
    }
    if !(0.0..=1.0).contains(&config.retrieval.abstain_threshold) {
        anyhow::bail!("retrieval.abstain_threshold must be in [0.0, 1.0]");
    }
    if !(1..=20).contains(&config.retrieval.answer_top_k) {
        anyhow::bail!("retrieval.answer_top_k must be in [1, 20]");
    }
    if config.retrieval.candidate_k_vector < 1 || config.retrieval.candidate_k_keyword < 1 {
        anyhow::bail!("retrieval candidate pool widths must be >= 1");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    const BASE: &str = r#"
[db]
path = "/tmp/qa.sqlite"

[server]
bind = "127.0.0.1:7431"

[ingest]
sources_json = "/tmp/sources.json"
raw_dir = "/tmp/raw"
"#;

    #[test]
    fn test_defaults_applied() {
        let f = write_config(BASE);
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg.chunking.target_chars, 900);
        assert_eq!(cfg.chunking.min_chars, 200);
        assert_eq!(cfg.chunking.overlap_paragraphs, 1);
        assert!((cfg.retrieval.hybrid_alpha - 0.7).abs() < 1e-12);
        assert!((cfg.retrieval.abstain_threshold - 0.28).abs() < 1e-12);
        assert_eq!(cfg.retrieval.candidate_k_vector, 30);
        assert_eq!(cfg.retrieval.answer_top_k, 4);
        assert_eq!(cfg.embedding.provider, "disabled");
    }

    #[test]
    fn test_alpha_out_of_range_rejected() {
        let body = format!("{}\n[retrieval]\nhybrid_alpha = 1.5\n", BASE);
        let f = write_config(&body);
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_enabled_provider_requires_model_and_dims() {
        let body = format!("{}\n[embedding]\nprovider = \"openai\"\n", BASE);
        let f = write_config(&body);
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let body = format!(
            "{}\n[embedding]\nprovider = \"cohere\"\nmodel = \"x\"\ndims = 8\n",
            BASE
        );
        let f = write_config(&body);
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_min_chars_above_target_rejected() {
        let body = format!(
            "{}\n[chunking]\ntarget_chars = 100\nmin_chars = 200\n",
            BASE
        );
        let f = write_config(&body);
        assert!(load_config(f.path()).is_err());
    }
}
