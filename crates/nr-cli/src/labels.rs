use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Load class labels, one per line.
///
/// Empty lines are kept so label positions keep lining up with the
/// model's class indices.
pub fn load_labels(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read labels from {}", path.display()))?;
    Ok(text.lines().map(|line| line.trim_end().to_string()).collect())
}
