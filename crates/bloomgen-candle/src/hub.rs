//! Checkpoint download from the Hugging Face hub

use hf_hub::api::sync::{Api, ApiBuilder};
use hf_hub::{Repo, RepoType};
use std::path::PathBuf;

use crate::CandleError;

pub const DEFAULT_REPO: &str = "bigscience/bloom-560m";
pub const DEFAULT_REVISION: &str = "main";

/// Local paths of a resolved checkpoint
#[derive(Debug, Clone)]
pub struct CheckpointFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: Vec<PathBuf>,
}

/// Hub coordinates of a checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub repo_id: String,
    pub revision: String,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            repo_id: DEFAULT_REPO.to_string(),
            revision: DEFAULT_REVISION.to_string(),
        }
    }
}

impl Checkpoint {
    pub fn new(repo_id: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            revision: revision.into(),
        }
    }

    /// Download (or reuse from the local cache) config, tokenizer and weights
    pub fn fetch(&self, token: Option<String>) -> Result<CheckpointFiles, CandleError> {
        let api = create_api(token)?;
        let repo = api.repo(Repo::with_revision(
            self.repo_id.clone(),
            RepoType::Model,
            self.revision.clone(),
        ));

        tracing::info!(repo = %self.repo_id, revision = %self.revision, "fetching checkpoint");
        let config = repo.get("config.json")?;
        let tokenizer = repo.get("tokenizer.json")?;

        let weights = single_or_sharded(repo.get("model.safetensors"), || {
            let index = repo.get("model.safetensors.index.json")?;
            Ok(shard_names(&std::fs::read_to_string(index)?)?
                .iter()
                .map(|name| repo.get(name))
                .collect::<Result<Vec<_>, _>>()?)
        })?;

        Ok(CheckpointFiles {
            config,
            tokenizer,
            weights,
        })
    }
}

fn create_api(token: Option<String>) -> Result<Api, CandleError> {
    let mut builder = ApiBuilder::new();
    if token.is_some() {
        builder = builder.with_token(token);
    }
    Ok(builder.build()?)
}

/// Use the single weights file, else the shards. When both fail the error
/// carries both causes.
fn single_or_sharded<E: std::fmt::Display>(
    single: Result<PathBuf, E>,
    shards: impl FnOnce() -> Result<Vec<PathBuf>, CandleError>,
) -> Result<Vec<PathBuf>, CandleError> {
    let single_err = match single {
        Ok(path) => return Ok(vec![path]),
        Err(err) => err,
    };
    tracing::debug!("no single-file weights ({single_err}), trying sharded index");

    shards().map_err(|shard_err| {
        CandleError::Other(format!(
            "model.safetensors unavailable ({single_err}); sharded weights unavailable ({shard_err})"
        ))
    })
}

/// Distinct shard file names referenced by a safetensors index, in order
fn shard_names(index_json: &str) -> Result<Vec<String>, CandleError> {
    let index: serde_json::Value =
        serde_json::from_str(index_json).map_err(|e| CandleError::Other(e.to_string()))?;
    let weight_map = index
        .get("weight_map")
        .and_then(|m| m.as_object())
        .ok_or_else(|| CandleError::Other("safetensors index has no weight_map".to_string()))?;

    let mut names: Vec<String> = Vec::new();
    for file in weight_map.values().filter_map(|v| v.as_str()) {
        if !names.iter().any(|n| n == file) {
            names.push(file.to_string());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_names_dedup_and_sort() {
        let index = r#"{
            "metadata": {"total_size": 10},
            "weight_map": {
                "h.1.mlp.dense_4h_to_h.weight": "model-00002-of-00002.safetensors",
                "word_embeddings.weight": "model-00001-of-00002.safetensors",
                "h.0.mlp.dense_4h_to_h.weight": "model-00001-of-00002.safetensors"
            }
        }"#;
        let names = shard_names(index).unwrap();
        assert_eq!(
            names,
            vec![
                "model-00001-of-00002.safetensors",
                "model-00002-of-00002.safetensors"
            ]
        );
    }

    #[test]
    fn test_shard_names_requires_weight_map() {
        assert!(shard_names(r#"{"metadata": {}}"#).is_err());
    }

    #[test]
    fn test_single_file_wins() {
        let weights = single_or_sharded(Ok::<_, String>(PathBuf::from("model.safetensors")), || {
            panic!("shards must not be fetched")
        })
        .unwrap();
        assert_eq!(weights, vec![PathBuf::from("model.safetensors")]);
    }

    #[test]
    fn test_sharded_fallback() {
        let weights = single_or_sharded(Err("404"), || {
            Ok(vec![
                PathBuf::from("model-00001-of-00002.safetensors"),
                PathBuf::from("model-00002-of-00002.safetensors"),
            ])
        })
        .unwrap();
        assert_eq!(weights.len(), 2);
    }

    #[test]
    fn test_both_failures_are_reported() {
        let err = single_or_sharded(Err("connection refused"), || {
            Err(CandleError::Other("index missing".to_string()))
        })
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("connection refused"), "{message}");
        assert!(message.contains("index missing"), "{message}");
    }

    #[test]
    fn test_default_checkpoint() {
        let checkpoint = Checkpoint::default();
        assert_eq!(checkpoint.repo_id, "bigscience/bloom-560m");
        assert_eq!(checkpoint.revision, "main");
    }
}
