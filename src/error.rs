use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open '{path}': {source}")]
    ModelRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("energy model file not found: {path}")]
    ModelNotFound { path: PathBuf },

    #[error(
        "{context}: {detail}{} in {path}{}",
        cluster_suffix(.cluster),
        line_suffix(.line)
    )]
    Grammar {
        context: &'static str,
        cluster: Option<char>,
        path: PathBuf,
        line: Option<usize>,
        detail: String,
    },

    #[error("failed to read trace snapshot {path}: {source}")]
    TopologyRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid trace snapshot {path}: {detail}")]
    TopologyParse { path: PathBuf, detail: String },

    #[error("energy model describes {model} clusters but topology has {topology}")]
    TopologyMismatch { model: usize, topology: usize },

    #[error("failed to write template {path}: {source}")]
    TemplateWrite {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn cluster_suffix(cluster: &Option<char>) -> String {
    cluster
        .map(|c| format!(" for cluster{}", c))
        .unwrap_or_default()
}

fn line_suffix(line: &Option<usize>) -> String {
    line.map(|l| format!(" (line {})", l)).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, Error>;
