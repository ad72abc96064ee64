//! Values held by model properties and definition fields.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// The declared kind of a definition field or model property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    String,
    Path,
    Bool,
    Integer,
    StringList,
    PathList,
    Task,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::String => "string",
            ValueKind::Path => "path",
            ValueKind::Bool => "bool",
            ValueKind::Integer => "integer",
            ValueKind::StringList => "list of strings",
            ValueKind::PathList => "list of paths",
            ValueKind::Task => "task",
        };
        write!(f, "{}", s)
    }
}

/// Reference to a registered task, as published in a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRef {
    pub project: String,
    pub name: String,
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project, self.name)
    }
}

/// A concrete model or definition value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ModelValue {
    String(String),
    Path(PathBuf),
    Bool(bool),
    Integer(i64),
    StringList(Vec<String>),
    PathList(Vec<PathBuf>),
    Task(TaskRef),
}

impl ModelValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ModelValue::String(_) => ValueKind::String,
            ModelValue::Path(_) => ValueKind::Path,
            ModelValue::Bool(_) => ValueKind::Bool,
            ModelValue::Integer(_) => ValueKind::Integer,
            ModelValue::StringList(_) => ValueKind::StringList,
            ModelValue::PathList(_) => ValueKind::PathList,
            ModelValue::Task(_) => ValueKind::Task,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ModelValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            ModelValue::Path(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ModelValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ModelValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            ModelValue::StringList(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_paths(&self) -> Option<&[PathBuf]> {
        match self {
            ModelValue::PathList(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_task(&self) -> Option<&TaskRef> {
        match self {
            ModelValue::Task(t) => Some(t),
            _ => None,
        }
    }

    /// Convert a raw TOML value into the declared kind.
    ///
    /// Paths are written as strings in raw input. Returns `None` when the
    /// value cannot represent `kind`.
    pub fn from_toml(kind: ValueKind, value: &toml::Value) -> Option<ModelValue> {
        match (kind, value) {
            (ValueKind::String, toml::Value::String(s)) => Some(ModelValue::String(s.clone())),
            (ValueKind::Path, toml::Value::String(s)) => Some(ModelValue::Path(PathBuf::from(s))),
            (ValueKind::Bool, toml::Value::Boolean(b)) => Some(ModelValue::Bool(*b)),
            (ValueKind::Integer, toml::Value::Integer(i)) => Some(ModelValue::Integer(*i)),
            (ValueKind::StringList, toml::Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(ModelValue::StringList),
            (ValueKind::PathList, toml::Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(PathBuf::from))
                .collect::<Option<Vec<_>>>()
                .map(ModelValue::PathList),
            _ => None,
        }
    }
}

impl fmt::Display for ModelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelValue::String(s) => write!(f, "{}", s),
            ModelValue::Path(p) => write!(f, "{}", p.display()),
            ModelValue::Bool(b) => write!(f, "{}", b),
            ModelValue::Integer(i) => write!(f, "{}", i),
            ModelValue::StringList(v) => write!(f, "[{}]", v.join(", ")),
            ModelValue::PathList(v) => {
                let parts: Vec<_> = v.iter().map(|p| p.display().to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            ModelValue::Task(t) => write!(f, "{}", t),
        }
    }
}

impl From<String> for ModelValue {
    fn from(s: String) -> Self {
        ModelValue::String(s)
    }
}

impl From<&str> for ModelValue {
    fn from(s: &str) -> Self {
        ModelValue::String(s.to_string())
    }
}

impl From<PathBuf> for ModelValue {
    fn from(p: PathBuf) -> Self {
        ModelValue::Path(p)
    }
}

impl From<&Path> for ModelValue {
    fn from(p: &Path) -> Self {
        ModelValue::Path(p.to_path_buf())
    }
}

impl From<bool> for ModelValue {
    fn from(b: bool) -> Self {
        ModelValue::Bool(b)
    }
}

impl From<i64> for ModelValue {
    fn from(i: i64) -> Self {
        ModelValue::Integer(i)
    }
}

impl From<Vec<String>> for ModelValue {
    fn from(v: Vec<String>) -> Self {
        ModelValue::StringList(v)
    }
}

impl From<Vec<PathBuf>> for ModelValue {
    fn from(v: Vec<PathBuf>) -> Self {
        ModelValue::PathList(v)
    }
}

impl From<TaskRef> for ModelValue {
    fn from(t: TaskRef) -> Self {
        ModelValue::Task(t)
    }
}
