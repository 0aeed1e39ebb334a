use thiserror::Error;

#[derive(Error, Debug)]
pub enum DabError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Stream error: {message}")]
    Stream { message: String },

    #[error("Superframe error: {message}")]
    Superframe { message: String },

    #[error("PAD error: {message}")]
    Pad { message: String },

    #[error("Flowgraph stage '{stage}' failed: {message}")]
    Flowgraph { stage: String, message: String },
}

impl DabError {
    pub fn config(message: impl Into<String>) -> Self {
        DabError::Config {
            message: message.into(),
        }
    }

    pub fn stream(message: impl Into<String>) -> Self {
        DabError::Stream {
            message: message.into(),
        }
    }

    pub fn superframe(message: impl Into<String>) -> Self {
        DabError::Superframe {
            message: message.into(),
        }
    }

    pub fn pad(message: impl Into<String>) -> Self {
        DabError::Pad {
            message: message.into(),
        }
    }

    pub fn flowgraph(stage: impl Into<String>, message: impl Into<String>) -> Self {
        DabError::Flowgraph {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DabError>;
