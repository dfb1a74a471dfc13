use clap::Subcommand;
use serde_json::json;
use std::path::PathBuf;

use crate::cli::OutputFormat;
use crate::config;
use crate::provenance::RelationSpec;
use crate::schema::{FileSchemaLoader, RelationshipKind, SchemaLoader};

#[derive(Subcommand)]
pub enum SchemaCommands {
    #[command(about = "Parse and validate every schema file")]
    Check {
        #[arg(long = "dir", help = "Schema directory (repeatable; defaults to SCHEMA_DIRS)")]
        dirs: Vec<PathBuf>,
    },
}

pub async fn handle(cmd: SchemaCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        SchemaCommands::Check { dirs } => check(dirs, output_format).await,
    }
}

/// Per-model result: `None` when the schema is valid
pub async fn check_dirs(dirs: Vec<PathBuf>) -> anyhow::Result<Vec<(String, Option<String>, Option<String>)>> {
    let loader = FileSchemaLoader::new(dirs, true);
    let models = loader.available_models()?;

    let mut results = Vec::new();
    for model in &models {
        let problem = match loader.get_schema(model).await {
            Ok(schema) => {
                // Two-hop relationships must resolve against the other schemas
                let mut problem = None;
                for rel in &schema.relationships {
                    if rel.kind != RelationshipKind::ManyToManyThrough {
                        continue;
                    }
                    if let Err(e) = RelationSpec::resolve(&loader, model, &rel.name).await {
                        problem = Some(format!("relationship '{}': {}", rel.name, e));
                        break;
                    }
                }
                problem
            }
            Err(e) => Some(e.to_string()),
        };
        results.push((model.clone(), problem, loader.checksum_of(model)));
    }
    Ok(results)
}

async fn check(dirs: Vec<PathBuf>, output_format: OutputFormat) -> anyhow::Result<()> {
    let dirs = if dirs.is_empty() {
        config::config().schema.schema_dirs.clone()
    } else {
        dirs
    };
    let results = check_dirs(dirs).await?;
    let failed = results.iter().filter(|(_, err, _)| err.is_some()).count();

    match output_format {
        OutputFormat::Json => {
            let body: Vec<_> = results
                .iter()
                .map(|(model, err, checksum)| {
                    json!({ "model": model, "ok": err.is_none(), "error": err, "checksum": checksum })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text => {
            for (model, err, _) in &results {
                match err {
                    None => println!("ok    {}", model),
                    Some(e) => println!("FAIL  {}: {}", model, e),
                }
            }
            println!("{} schemas checked, {} failed", results.len(), failed);
        }
    }

    if failed > 0 {
        anyhow::bail!("{} schema(s) failed validation", failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bundled_schemas_pass() {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("schema/crud6");
        let results = check_dirs(vec![dir]).await.unwrap();
        assert!(results.iter().any(|(m, _, _)| m == "users"));
        for (model, err, checksum) in &results {
            assert!(err.is_none(), "{}: {:?}", model, err);
            assert_eq!(checksum.as_ref().map(|c| c.len()), Some(64));
        }
    }
}
