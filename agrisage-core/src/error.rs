use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgrisageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error(transparent)]
    Store(#[from] crate::store::StoreError),

    #[error(transparent)]
    Blob(#[from] crate::storage::BlobError),

    #[error("Other error: {0}")]
    Other(String),
}
