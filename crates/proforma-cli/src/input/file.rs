use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

use proforma_core::ProjectionOptions;

/// Read a JSON or YAML file (chosen by extension) into a typed value.
pub fn read_document<T: DeserializeOwned>(path: &str) -> Result<T, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let contents = fs::read_to_string(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;

    let value = if is_yaml(&canonical) {
        serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?
    } else {
        serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?
    };
    log::debug!("loaded {}", canonical.display());
    Ok(value)
}

/// Load engine options from a config file, or the defaults when no file is
/// given.
pub fn read_options(path: Option<&str>) -> Result<ProjectionOptions, Box<dyn std::error::Error>> {
    match path {
        Some(p) => read_document(p),
        None => Ok(ProjectionOptions::default()),
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Resolve and validate the path.
fn resolve_path(path: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let p = Path::new(path);
    let canonical = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };

    if !canonical.exists() {
        return Err(format!("File not found: {}", canonical.display()).into());
    }

    if !canonical.is_file() {
        return Err(format!("Not a file: {}", canonical.display()).into());
    }

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_extension() {
        assert!(is_yaml(Path::new("options.yaml")));
        assert!(is_yaml(Path::new("a/b.yml")));
        assert!(!is_yaml(Path::new("options.json")));
    }

    #[test]
    fn test_missing_file() {
        assert!(read_document::<serde_json::Value>("/definitely/not/here.json").is_err());
    }

    #[test]
    fn test_yaml_options_parse() {
        let options: ProjectionOptions =
            serde_yaml::from_str("strict_tax_model: true\ndiscount_rate: \"0.09\"\n").unwrap();
        assert!(options.strict_tax_model);
        assert_eq!(options.discount_rate.map(|r| r.to_string()), Some("0.09".into()));
        assert_eq!(options.solver.max_iterations, 200);
    }
}
