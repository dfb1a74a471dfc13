use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema not found: {0}")]
    NotFound(String),

    #[error("Invalid model name: {0}")]
    InvalidModelName(String),

    #[error("Invalid schema {model}: {message}")]
    Invalid { model: String, message: String },

    #[error("Failed to read schema file: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl SchemaError {
    pub fn invalid(model: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaError::Invalid {
            model: model.into(),
            message: message.into(),
        }
    }
}
