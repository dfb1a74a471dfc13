use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use super::error::SchemaError;
use super::model::{is_identifier, ModelSchema};

/// Supplies parsed schemas by model name
#[async_trait]
pub trait SchemaLoader: Send + Sync {
    async fn get_schema(&self, model: &str) -> Result<Arc<ModelSchema>, SchemaError>;
}

#[derive(Debug, Clone)]
struct CachedSchema {
    schema: Arc<ModelSchema>,
    checksum: String,
}

/// Reads `<model>.json` (or `.yaml`/`.yml`) from a list of directories
pub struct FileSchemaLoader {
    dirs: Vec<PathBuf>,
    cache_enabled: bool,
    cache: RwLock<HashMap<String, CachedSchema>>,
}

impl FileSchemaLoader {
    pub fn new(dirs: Vec<PathBuf>, cache_enabled: bool) -> Self {
        Self {
            dirs,
            cache_enabled,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config() -> Self {
        let cfg = &crate::config::config().schema;
        Self::new(cfg.schema_dirs.clone(), cfg.cache_schemas)
    }

    /// Locate the first schema file for `model` across the configured directories
    fn locate(&self, model: &str) -> Option<PathBuf> {
        self.dirs.iter().find_map(|dir| {
            ["json", "yaml", "yml"]
                .iter()
                .map(|ext| dir.join(format!("{}.{}", model, ext)))
                .find(|p| p.is_file())
        })
    }

    /// Names of every model found in the configured directories
    pub fn available_models(&self) -> Result<Vec<String>, SchemaError> {
        let mut models = Vec::new();
        for dir in &self.dirs {
            if !dir.is_dir() {
                continue;
            }
            for entry in std::fs::read_dir(dir)? {
                let path = entry?.path();
                let is_schema = matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("json") | Some("yaml") | Some("yml")
                );
                if let (true, Some(stem)) = (is_schema, path.file_stem().and_then(|s| s.to_str())) {
                    if !models.iter().any(|m| m == stem) {
                        models.push(stem.to_string());
                    }
                }
            }
        }
        models.sort();
        Ok(models)
    }

    pub fn load_file(path: &Path) -> Result<(ModelSchema, String), SchemaError> {
        let raw = std::fs::read_to_string(path)?;
        let schema: ModelSchema = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&raw)?,
            _ => serde_json::from_str(&raw)?,
        };
        schema.validate()?;
        Ok((schema, checksum(&raw)))
    }

    pub fn checksum_of(&self, model: &str) -> Option<String> {
        self.cache
            .read()
            .ok()
            .and_then(|c| c.get(model).map(|s| s.checksum.clone()))
    }
}

#[async_trait]
impl SchemaLoader for FileSchemaLoader {
    async fn get_schema(&self, model: &str) -> Result<Arc<ModelSchema>, SchemaError> {
        if !is_identifier(model) {
            return Err(SchemaError::InvalidModelName(model.to_string()));
        }

        if self.cache_enabled {
            if let Some(hit) = self.cache.read().ok().and_then(|c| c.get(model).cloned()) {
                return Ok(hit.schema);
            }
        }

        let path = self
            .locate(model)
            .ok_or_else(|| SchemaError::NotFound(model.to_string()))?;
        let (schema, checksum) = Self::load_file(&path)?;
        debug!("Loaded schema {} from {} ({})", model, path.display(), checksum);

        let schema = Arc::new(schema);
        if let Ok(mut cache) = self.cache.write() {
            if self.cache_enabled && !cache.contains_key(model) {
                info!("Caching schema {}", model);
            }
            cache.insert(
                model.to_string(),
                CachedSchema {
                    schema: schema.clone(),
                    checksum,
                },
            );
        }
        Ok(schema)
    }
}

/// Fixed set of schemas, for tests and embedded use
#[derive(Default)]
pub struct StaticSchemaLoader {
    schemas: HashMap<String, Arc<ModelSchema>>,
}

impl StaticSchemaLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, schema: ModelSchema) -> Self {
        self.schemas.insert(schema.model.clone(), Arc::new(schema));
        self
    }
}

#[async_trait]
impl SchemaLoader for StaticSchemaLoader {
    async fn get_schema(&self, model: &str) -> Result<Arc<ModelSchema>, SchemaError> {
        self.schemas
            .get(model)
            .cloned()
            .ok_or_else(|| SchemaError::NotFound(model.to_string()))
    }
}

fn checksum(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
