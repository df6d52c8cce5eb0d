//! Required-field checks on the raw configuration mapping

use serde_json::Value;

use semlayer_core::{Result, SemlayerError};

/// Dotted paths that must be present before typed deserialization.
pub const REQUIRED_FIELDS: &[&str] = &[
    "snowflake.account",
    "snowflake.user",
    "semantic_model.name",
    "semantic_model.base_tables",
];

/// Fail with `MissingField` naming the first absent (or null) required path.
pub fn check_required_fields(root: &Value) -> Result<()> {
    for path in REQUIRED_FIELDS {
        if lookup(root, path).map_or(true, Value::is_null) {
            return Err(SemlayerError::MissingField(path.to_string()));
        }
    }
    Ok(())
}

fn lookup<'a>(root: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted
        .split('.')
        .try_fold(root, |node, key| node.as_object()?.get(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn complete() -> Value {
        json!({
            "snowflake": { "account": "acme", "user": "loader" },
            "semantic_model": { "name": "sales", "base_tables": ["DB.S.T"] }
        })
    }

    #[test]
    fn test_complete_mapping_passes() {
        assert!(check_required_fields(&complete()).is_ok());
    }

    #[test]
    fn test_each_required_field_is_reported() {
        for path in REQUIRED_FIELDS {
            let mut root = complete();
            let (section, field) = path.split_once('.').unwrap();
            root[section].as_object_mut().unwrap().remove(field);
            match check_required_fields(&root) {
                Err(SemlayerError::MissingField(f)) => assert_eq!(f, *path),
                other => panic!("expected MissingField({path}), got {other:?}"),
            }
        }
    }

    #[test]
    fn test_missing_section() {
        let root = json!({ "semantic_model": { "name": "sales", "base_tables": [] } });
        assert!(matches!(
            check_required_fields(&root),
            Err(SemlayerError::MissingField(f)) if f == "snowflake.account"
        ));
    }

    #[test]
    fn test_null_counts_as_missing() {
        let mut root = complete();
        root["snowflake"]["user"] = Value::Null;
        assert!(matches!(
            check_required_fields(&root),
            Err(SemlayerError::MissingField(f)) if f == "snowflake.user"
        ));
    }
}
