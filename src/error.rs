use thiserror::Error;

/// Failures talking to the cluster API.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("kube client error: {0}")]
    Kube(#[from] kube::Error),

    #[error("GET {path} returned {code}: {message}")]
    Status {
        path: String,
        code: u16,
        message: String,
    },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("loading kubeconfig: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),
}

/// Why one kind was left untouched during a synchronization pass.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("fetch failed: {0}")]
    Cluster(#[from] ClusterError),

    #[error("cache write failed: {0}")]
    Store(#[from] StoreError),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("store task failed: {0}")]
    Task(String),
}

pub type QueryResult<T> = Result<T, QueryError>;

/// Errors surfaced to the request layer.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("parsing config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
