//! Definition input and its validated form.
//!
//! Users hand the binder a [`RawDefinition`]: untyped TOML values plus an
//! optional target path into the parent model. The binder validates it
//! against the declaration's [`DefinitionShape`] and hands the configuration
//! function a fresh [`Definition`] with defaults applied.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use crate::core::{BindingError, DefinitionShape, Identifier};
use crate::model::ModelValue;

/// Unvalidated user input for one application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDefinition {
    target: Option<String>,
    values: toml::Table,
}

impl RawDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the values from a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let values: toml::Table = toml::from_str(input).context("failed to parse definition")?;
        Ok(RawDefinition {
            target: None,
            values,
        })
    }

    /// Select the parent model node the feature attaches to, e.g. `sources.main`.
    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.target = Some(path.into());
        self
    }

    /// Set a field value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn values(&self) -> &toml::Table {
        &self.values
    }
}

/// A definition validated against its shape.
#[derive(Debug, Clone)]
pub struct Definition {
    name: Identifier,
    shape: Identifier,
    values: BTreeMap<Identifier, ModelValue>,
}

impl Definition {
    /// Validate `raw` against `shape`.
    ///
    /// Unknown keys, missing required fields and values of the wrong kind are
    /// rejected. Omitted fields with a default take the default.
    pub fn from_raw(
        name: Identifier,
        shape: &DefinitionShape,
        raw: &RawDefinition,
    ) -> Result<Self, BindingError> {
        let shape_name = shape.name();

        let mut unknown: Vec<&str> = raw
            .values
            .keys()
            .filter(|key| shape.field_named(key).is_none())
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            unknown.sort_unstable();
            return Err(BindingError::invalid_definition(
                shape_name.as_str(),
                format!("unknown field(s): {}", unknown.join(", ")),
            ));
        }

        let mut values = BTreeMap::new();
        for field in shape.fields() {
            match raw.values.get(field.name.as_str()) {
                Some(raw_value) => {
                    let value = ModelValue::from_toml(field.kind, raw_value).ok_or_else(|| {
                        BindingError::invalid_definition(
                            shape_name.as_str(),
                            format!(
                                "field `{}` expects {}, found `{}`",
                                field.name, field.kind, raw_value
                            ),
                        )
                    })?;
                    values.insert(field.name, value);
                }
                None if field.required => {
                    return Err(BindingError::invalid_definition(
                        shape_name.as_str(),
                        format!("missing required field `{}`", field.name),
                    ));
                }
                None => {
                    if let Some(default) = &field.default {
                        values.insert(field.name, default.clone());
                    }
                }
            }
        }

        Ok(Definition {
            name,
            shape: shape_name,
            values,
        })
    }

    /// Name of the node this definition configures, e.g. `main`.
    pub fn name(&self) -> Identifier {
        self.name
    }

    pub fn shape_name(&self) -> Identifier {
        self.shape
    }

    pub fn get(&self, field: &str) -> Option<&ModelValue> {
        self.values.get(field)
    }

    pub fn values(&self) -> &BTreeMap<Identifier, ModelValue> {
        &self.values
    }

    pub fn string(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(ModelValue::as_str)
    }

    pub fn path(&self, field: &str) -> Option<&Path> {
        self.get(field).and_then(ModelValue::as_path)
    }

    pub fn bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(ModelValue::as_bool)
    }

    pub fn integer(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(ModelValue::as_integer)
    }

    pub fn strings(&self, field: &str) -> Option<&[String]> {
        self.get(field).and_then(ModelValue::as_strings)
    }

    /// Deserialize the validated values into a plugin's own struct.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, BindingError> {
        let table: toml::Table = self
            .values
            .iter()
            .map(|(name, value)| (name.to_string(), to_toml(value)))
            .collect();

        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| {
                BindingError::invalid_definition(self.shape.as_str(), e.message().to_string())
            })
    }
}

fn to_toml(value: &ModelValue) -> toml::Value {
    match value {
        ModelValue::String(s) => toml::Value::String(s.clone()),
        ModelValue::Path(p) => toml::Value::String(p.display().to_string()),
        ModelValue::Bool(b) => toml::Value::Boolean(*b),
        ModelValue::Integer(i) => toml::Value::Integer(*i),
        ModelValue::StringList(items) => {
            toml::Value::Array(items.iter().cloned().map(toml::Value::String).collect())
        }
        ModelValue::PathList(items) => toml::Value::Array(
            items
                .iter()
                .map(|p| toml::Value::String(p.display().to_string()))
                .collect(),
        ),
        ModelValue::Task(task) => toml::Value::String(task.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ValueKind;
    use serde::Deserialize;
    use std::path::PathBuf;

    fn checkstyle_shape() -> DefinitionShape {
        DefinitionShape::new("CheckstyleDefinition")
            .with_default("configFile", PathBuf::from("config/checkstyle/checkstyle.xml"))
            .field("maxWarnings", ValueKind::Integer)
            .required("toolVersion", ValueKind::String)
    }

    #[test]
    fn test_defaults_applied() {
        let raw = RawDefinition::new().with("toolVersion", "10.12");
        let def = Definition::from_raw(Identifier::new("main"), &checkstyle_shape(), &raw).unwrap();

        assert_eq!(def.name().as_str(), "main");
        assert_eq!(
            def.path("configFile"),
            Some(Path::new("config/checkstyle/checkstyle.xml"))
        );
        assert_eq!(def.string("toolVersion"), Some("10.12"));
        assert!(def.get("maxWarnings").is_none());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let raw = RawDefinition::new()
            .with("toolVersion", "10.12")
            .with("colour", "blue");

        let err = Definition::from_raw(Identifier::new("main"), &checkstyle_shape(), &raw).unwrap_err();
        assert!(matches!(err, BindingError::InvalidDefinition { .. }));
        assert!(err.to_string().contains("colour"));
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let err = Definition::from_raw(
            Identifier::new("main"),
            &checkstyle_shape(),
            &RawDefinition::new(),
        )
        .unwrap_err();

        assert!(err.to_string().contains("toolVersion"));
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let raw = RawDefinition::new()
            .with("toolVersion", "10.12")
            .with("maxWarnings", "many");

        let err = Definition::from_raw(Identifier::new("main"), &checkstyle_shape(), &raw).unwrap_err();
        assert!(err.to_string().contains("expects integer"));
    }

    #[test]
    fn test_from_toml_str_and_parse() {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Settings {
            config_file: PathBuf,
            tool_version: String,
            max_warnings: Option<i64>,
        }

        let raw = RawDefinition::from_toml_str("toolVersion = \"10.12\"\nmaxWarnings = 3\n")
            .unwrap()
            .at("sources.main");
        assert_eq!(raw.target(), Some("sources.main"));

        let def = Definition::from_raw(Identifier::new("main"), &checkstyle_shape(), &raw).unwrap();
        let settings: Settings = def.parse().unwrap();

        assert_eq!(settings.config_file, PathBuf::from("config/checkstyle/checkstyle.xml"));
        assert_eq!(settings.tool_version, "10.12");
        assert_eq!(settings.max_warnings, Some(3));
    }
}
