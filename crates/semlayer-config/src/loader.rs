//! Loading configuration from files and in-memory mappings

use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, info};

use semlayer_core::{Result, SemlayerError};

use crate::schema::Config;
use crate::validation::check_required_fields;

const LEGACY_USE_CORTEX: &str = "use_cortex";
const LEGACY_FALLBACK_SERVICE: &str = "fallback_service";

/// Load a configuration file; the format is chosen by extension.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SemlayerError::ConfigNotFound(path.to_path_buf()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let parse: fn(&str) -> Result<Config> = match ext.as_str() {
        "yaml" | "yml" => Config::from_yaml_str,
        "json" => Config::from_json_str,
        _ => return Err(SemlayerError::UnsupportedFormat(format!(".{ext}"))),
    };

    let content = std::fs::read_to_string(path)?;
    let config = parse(&content)?;

    info!("Loaded configuration from {:?}", path);
    Ok(config)
}

impl Config {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(content)?;
        config_from_value(value)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)?;
        config_from_value(value)
    }
}

/// Build a typed configuration from a generic mapping.
pub fn config_from_value(mut root: Value) -> Result<Config> {
    check_required_fields(&root)?;

    if let Some(llm) = root.get_mut("llm").and_then(Value::as_object_mut) {
        normalize_legacy_llm(llm);
    }

    serde_json::from_value(root).map_err(|e| SemlayerError::InvalidConfig(e.to_string()))
}

/// Rewrite the legacy `use_cortex` / `fallback_service` keys into
/// `provider` / `fallback_provider`. The legacy keys are always removed.
pub fn normalize_legacy_llm(llm: &mut Map<String, Value>) {
    let use_cortex = llm.remove(LEGACY_USE_CORTEX);
    let fallback_service = llm
        .remove(LEGACY_FALLBACK_SERVICE)
        .filter(|v| !v.is_null());

    if use_cortex.is_none() && fallback_service.is_none() {
        return;
    }

    if llm.contains_key("provider") {
        debug!("Explicit llm.provider set; ignoring legacy keys");
        return;
    }

    match use_cortex.as_ref().and_then(Value::as_bool) {
        Some(true) => {
            llm.insert("provider".to_string(), Value::from("cortex"));
            if let Some(service) = fallback_service {
                llm.entry("fallback_provider").or_insert(service);
            }
        }
        Some(false) => {
            let provider = fallback_service.unwrap_or_else(|| Value::from("openai"));
            llm.insert("provider".to_string(), provider);
            if !llm.contains_key("api_key") {
                if let Some(key) = llm.remove("fallback_api_key") {
                    llm.insert("api_key".to_string(), key);
                }
            }
        }
        None => {
            if let Some(service) = fallback_service {
                llm.entry("fallback_provider").or_insert(service);
            }
        }
    }

    debug!(
        "Normalized legacy LLM keys to provider={:?}",
        llm.get("provider")
    );
}
