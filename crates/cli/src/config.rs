//! Run files for the `run` command

use anyhow::{Context, Result};
use markerprep_core::{CategoryMap, PipelineConfig};
use markerprep_filters::Gazetteer;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything one pipeline run needs: where to read, where to write and how
/// to filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Place names of the target country, one per line
    pub gazetteer: PathBuf,
    /// Optional YAML/TOML fine-to-coarse category mapping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<PathBuf>,
    pub input: InputConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Input tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    pub edges: PathBuf,
    pub followers: PathBuf,
    pub markers: PathBuf,
}

/// Output tables. The format follows the file extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub edges: PathBuf,
    pub followers: PathBuf,
    /// Defaults to `<edges stem>.removed.jsonl`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_markers: Option<PathBuf>,
}

impl RunConfig {
    /// Load a run file (YAML or TOML). Relative paths inside it are resolved
    /// against the run file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config: Self = load_structured(path, "run config")?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        let content = match extension {
            "yaml" | "yml" => serde_yaml::to_string(self)?,
            "toml" => toml::to_string_pretty(self)?,
            _ => {
                return Err(anyhow::anyhow!(
                    "Unsupported config file format: {}. Use .yaml, .yml, or .toml",
                    extension
                ))
            }
        };

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Starter run file with the default pipeline thresholds.
    pub fn template() -> Self {
        Self {
            gazetteer: PathBuf::from("gazetteer.txt"),
            categories: Some(PathBuf::from("categories.yaml")),
            input: InputConfig {
                edges: PathBuf::from("edges.jsonl"),
                followers: PathBuf::from("followers.jsonl"),
                markers: PathBuf::from("markers.jsonl"),
            },
            output: OutputConfig {
                edges: PathBuf::from("out/edges.jsonl"),
                followers: PathBuf::from("out/followers.jsonl"),
                removed_markers: None,
            },
            pipeline: PipelineConfig::default(),
        }
    }

    /// Where removed markers are written.
    pub fn removed_markers_path(&self) -> PathBuf {
        self.output
            .removed_markers
            .clone()
            .unwrap_or_else(|| markerprep_formats::removed_path(&self.output.edges))
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.gazetteer);
        if let Some(categories) = self.categories.as_mut() {
            resolve(categories);
        }
        resolve(&mut self.input.edges);
        resolve(&mut self.input.followers);
        resolve(&mut self.input.markers);
        resolve(&mut self.output.edges);
        resolve(&mut self.output.followers);
        if let Some(removed) = self.output.removed_markers.as_mut() {
            resolve(removed);
        }
    }
}

/// Load a category map from YAML or TOML.
pub fn load_category_map(path: &Path) -> Result<CategoryMap> {
    load_structured(path, "category map")
}

/// Load a plain-text gazetteer.
pub fn load_gazetteer(path: &Path) -> Result<Gazetteer> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read gazetteer: {}", path.display()))?;
    Gazetteer::from_lines(&content)
        .with_context(|| format!("Invalid gazetteer: {}", path.display()))
}

fn load_structured<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}: {}", what, path.display()))?;

    let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

    match extension {
        "yaml" | "yml" => serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML {}: {}", what, path.display())),
        "toml" => toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML {}: {}", what, path.display())),
        _ => Err(anyhow::anyhow!(
            "Unsupported config file format: {}. Use .yaml, .yml, or .toml",
            extension
        )),
    }
}
