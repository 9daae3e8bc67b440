//! Reading raw configuration from JSON or YAML
//!
//! Both formats are parsed into the same nested [`Value`] mapping. Duplicate
//! keys at any depth are rejected instead of silently keeping the last one.

use crate::error::{Error, Result};
use crate::resolved::ResolvedConfig;
use crate::resolver::ConfigResolver;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;

/// On-disk encoding of a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    Yaml,
}

impl InputFormat {
    /// Format implied by the file extension, if any.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    /// Parse `content` in this format.
    pub fn parse(self, content: &str) -> Result<Value> {
        match self {
            Self::Json => parse_json_str(content),
            Self::Yaml => parse_yaml_str(content),
        }
    }
}

/// Parse JSON text, rejecting duplicate keys.
pub fn parse_json_str(content: &str) -> Result<Value> {
    serde_json::from_str::<StrictValue>(content)
        .map(|v| v.0)
        .map_err(|e| Error::Parse { message: format!("invalid JSON: {e}") })
}

/// Parse YAML text, rejecting duplicate keys.
pub fn parse_yaml_str(content: &str) -> Result<Value> {
    serde_yaml::from_str::<StrictValue>(content)
        .map(|v| v.0)
        .map_err(|e| Error::Parse { message: format!("invalid YAML: {e}") })
}

/// Read and parse a configuration file without resolving it.
///
/// Files without a `.json`, `.yaml` or `.yml` extension are tried as JSON,
/// then as YAML.
pub fn load_raw<P: AsRef<Path>>(path: P) -> Result<Value> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;

    let value = match InputFormat::from_path(path) {
        Some(format) => format.parse(&content),
        None => parse_json_str(&content).or_else(|json_err| {
            parse_yaml_str(&content).map_err(|yaml_err| Error::Parse {
                message: format!("{}: not JSON ({json_err}) nor YAML ({yaml_err})", path.display()),
            })
        }),
    }?;

    debug!(path = %path.display(), "loaded raw configuration");
    Ok(value)
}

/// Load and resolve a configuration file with the built-in sections only.
pub fn load_config<P: AsRef<Path>>(path: P, world_size: u64) -> Result<ResolvedConfig> {
    load_config_with(&ConfigResolver::new(), path, world_size)
}

/// Load a configuration file and resolve it with `resolver`.
pub fn load_config_with<P: AsRef<Path>>(
    resolver: &ConfigResolver,
    path: P,
    world_size: u64,
) -> Result<ResolvedConfig> {
    let raw = load_raw(path)?;
    resolver.resolve(&raw, world_size)
}

struct StrictValue(Value);

impl<'de> Deserialize<'de> for StrictValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(StrictVisitor).map(StrictValue)
    }
}

struct StrictVisitor;

impl<'de> Visitor<'de> for StrictVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a configuration value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Value, E> {
        Number::from_f64(v)
            .map(Value::Number)
            .ok_or_else(|| E::custom(format!("non-finite number {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Value, D::Error> {
        StrictValue::deserialize(deserializer).map(|v| v.0)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(StrictValue(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Value, A::Error> {
        let mut entries = Map::new();
        while let Some(key) = map.next_key::<String>()? {
            if entries.contains_key(&key) {
                return Err(de::Error::custom(format!("duplicate key `{key}`")));
            }
            let StrictValue(value) = map.next_value()?;
            entries.insert(key, value);
        }
        Ok(Value::Object(entries))
    }
}
