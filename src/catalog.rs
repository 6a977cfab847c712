use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::model::Requirement;

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(default)]
    description: String,
    #[serde(default)]
    controls: Vec<String>,
}

pub fn load_catalog(path: &Path) -> Result<Vec<Requirement>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read requirement catalog {}", path.display()))?;
    let requirements = parse_catalog(&raw)
        .with_context(|| format!("invalid requirement catalog {}", path.display()))?;
    info!(
        path = %path.display(),
        requirements = requirements.len(),
        "requirement catalog loaded"
    );
    Ok(requirements)
}

/// Requirements come back in file order.
pub fn parse_catalog(raw: &str) -> Result<Vec<Requirement>> {
    let value: Value = serde_json::from_str(raw).context("catalog is not valid JSON")?;
    let Value::Object(entries) = value else {
        bail!("catalog top level must be an object mapping requirement name to definition");
    };
    if entries.is_empty() {
        bail!("catalog defines no requirements");
    }

    let mut requirements = Vec::with_capacity(entries.len());
    for (name, entry) in entries {
        let name = name.trim().to_string();
        if name.is_empty() {
            bail!("catalog contains a requirement with an empty name");
        }
        let entry: CatalogEntry = serde_json::from_value(entry)
            .with_context(|| format!("invalid definition for requirement '{name}'"))?;
        requirements.push(Requirement {
            name,
            description: entry.description.trim().to_string(),
            controls: entry
                .controls
                .into_iter()
                .map(|control| control.trim().to_string())
                .filter(|control| !control.is_empty())
                .collect(),
        });
    }

    Ok(requirements)
}
