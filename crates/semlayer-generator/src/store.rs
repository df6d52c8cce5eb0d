//! Reading and writing semantic model documents

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use semlayer_core::{Result, SemanticModel};

/// Parse and validate a semantic model YAML document.
pub fn load_semantic_model_from_str(yaml: &str) -> Result<SemanticModel> {
    SemanticModel::from_yaml_str(yaml)
}

pub fn load_semantic_model_from_file(path: impl AsRef<Path>) -> Result<SemanticModel> {
    let content = fs::read_to_string(path.as_ref())?;
    load_semantic_model_from_str(&content)
}

/// Write `yaml` to `dir/filename`, creating `dir` if needed.
pub fn save_semantic_model(
    yaml: &str,
    dir: impl AsRef<Path>,
    filename: &str,
) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let path = dir.join(filename);
    fs::write(&path, yaml)?;
    info!("Wrote semantic model to {:?}", path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use semlayer_core::SemlayerError;

    const MODEL: &str = r#"
name: sales
tables:
  - name: ORDERS
    base_table:
      database: SALES
      schema: PUBLIC
      table: ORDERS
    dimensions:
      - name: STATUS
        expr: STATUS
        data_type: TEXT
"#;

    #[test]
    fn test_save_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("models").join("nested");

        let path = save_semantic_model(MODEL, &target, "sales.yaml").unwrap();
        assert_eq!(path, target.join("sales.yaml"));
        assert_eq!(fs::read_to_string(&path).unwrap(), MODEL);

        let model = load_semantic_model_from_file(&path).unwrap();
        assert_eq!(model.tables[0].name, "ORDERS");
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_semantic_model_from_file(dir.path().join("absent.yaml")),
            Err(SemlayerError::Io(_))
        ));
    }

    #[test]
    fn test_load_rejects_table_without_columns() {
        let yaml = "name: sales\ntables:\n  - name: T\n    base_table: {database: D, schema: S, table: T}\n";
        assert!(matches!(
            load_semantic_model_from_str(yaml),
            Err(SemlayerError::InvalidModel(_))
        ));
    }
}
