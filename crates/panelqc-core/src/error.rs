use std::path::PathBuf;

/// Structural problems that make a panel impossible to check or draw.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PanelError {
    #[error("panel {field} must be a positive finite number, got {value}")]
    InvalidDimension { field: &'static str, value: f64 },

    #[error("seismic zone {0} is outside 0-4")]
    SeismicZone(u8),

    #[error("{kind} id must not be empty")]
    EmptyId { kind: &'static str },

    #[error("duplicate entity id '{0}'")]
    DuplicateId(String),

    #[error("{kind} '{id}' has invalid {field}: {value}")]
    InvalidGeometry {
        kind: &'static str,
        id: String,
        field: &'static str,
        value: f64,
    },

    #[error("{kind} '{id}' lies outside the panel")]
    OutOfBounds { kind: &'static str, id: String },

    #[error("opening '{opening}' references unknown jack stud '{stud}'")]
    UnknownJackStud { opening: String, stud: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("rule configuration is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rule configuration must be a JSON object")]
    NotAnObject,

    #[error("unsupported rule configuration version {0}")]
    UnsupportedVersion(String),

    #[error("unknown rule category '{0}'")]
    UnknownCategory(String),

    #[error("rule category '{category}' is malformed: {detail}")]
    MalformedCategory { category: String, detail: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },
}
