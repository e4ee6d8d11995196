//! # Typed parameter sets
//!
//! A [`ParameterSet`] is the unit of configuration for every component of
//! a process. It maps names to typed [`Value`]s, may nest other sets, and
//! is immutable once built. Sets are assembled with a
//! [`ParameterSetBuilder`]; building copies the entries out, so a builder
//! reused as a template never aliases the sets produced from it.
//!
//! ## Tracked and untracked parameters
//!
//! Every parameter is either *tracked* (the default) or *untracked*. Only
//! tracked parameters contribute to the set's identity
//! ([`ParameterSet::id`]); untracked ones are meant for things like input
//! file lists or verbosity that do not change what a component computes.
//!
//! ## Serialized form
//!
//! In YAML/JSON a set is a mapping from names to single-key typed values:
//!
//! ```yaml
//! PDG: { vint32: [13] }
//! P0: { vdouble: [6.0] }
//! GDML: { file_in_path: "Geometry/gdml/ndos.gdml" }
//! fileNames: { untracked: { vstring: ["single_gen.root"] } }
//! ```

pub mod file_in_path;
pub mod types;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::utils::hash::fnv1a;

pub use file_in_path::{FileInPath, SearchPath, SEARCH_PATH_ENV};
pub use types::{ParamType, ParamValue, Value};

/// Errors raised while declaring or reading parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterError {
    #[error("parameter '{key}' is already declared as {existing}, cannot redeclare it as {requested}")]
    DuplicateKey {
        key: String,
        existing: ParamType,
        requested: ParamType,
    },

    #[error("parameter '{key}' has type {found} but was requested as {expected}")]
    TypeMismatch {
        key: String,
        expected: ParamType,
        found: ParamType,
    },

    #[error("required parameter '{key}' is missing")]
    MissingKey { key: String },

    #[error("file '{file}' not found (search path: '{searched}')")]
    FileNotFound { file: String, searched: String },
}

/// Identity of a parameter set: a stable hash of its tracked entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSetId(u64);

impl ParameterSetId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ParameterSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Parameter {
    value: Value,
    tracked: bool,
}

/// Immutable, typed, nested key/value configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, RawParameter>",
    into = "BTreeMap<String, RawParameter>"
)]
pub struct ParameterSet {
    entries: BTreeMap<String, Parameter>,
}

impl ParameterSet {
    /// An empty set.
    pub fn new() -> Self {
        ParameterSet::default()
    }

    pub fn builder() -> ParameterSetBuilder {
        ParameterSetBuilder::new()
    }

    /// Start a new builder pre-populated with this set's entries.
    pub fn to_builder(&self) -> ParameterSetBuilder {
        ParameterSetBuilder {
            entries: self.entries.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Parameter names in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    /// Iterate over `(name, value, tracked)` in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value, bool)> {
        self.entries
            .iter()
            .map(|(k, p)| (k.as_str(), &p.value, p.tracked))
    }

    pub fn param_type(&self, key: &str) -> Option<ParamType> {
        self.entries.get(key).map(|p| p.value.param_type())
    }

    pub fn is_tracked(&self, key: &str) -> Option<bool> {
        self.entries.get(key).map(|p| p.tracked)
    }

    /// Read a required parameter of type `T`.
    ///
    /// # Examples
    /// ```
    /// use evproc::pset::{ParameterSet, ParameterError};
    ///
    /// let mut builder = ParameterSet::builder();
    /// builder.set("BigBoxRange", 1500.0).unwrap();
    /// let pset = builder.build();
    ///
    /// assert_eq!(pset.get::<f64>("BigBoxRange"), Ok(1500.0));
    /// assert!(matches!(pset.get::<i32>("BigBoxRange"), Err(ParameterError::TypeMismatch { .. })));
    /// assert!(matches!(pset.get::<f64>("Other"), Err(ParameterError::MissingKey { .. })));
    /// ```
    pub fn get<T: ParamValue>(&self, key: &str) -> Result<T, ParameterError> {
        let value = self.get_value(key, T::TYPE)?;
        T::from_value(value).ok_or_else(|| ParameterError::TypeMismatch {
            key: key.to_string(),
            expected: T::TYPE,
            found: value.param_type(),
        })
    }

    /// Read an optional parameter, falling back to `default` when absent.
    ///
    /// A present parameter of the wrong type is still an error.
    pub fn get_or<T: ParamValue>(&self, key: &str, default: T) -> Result<T, ParameterError> {
        if self.contains(key) {
            self.get(key)
        } else {
            Ok(default)
        }
    }

    /// Untyped read checked against `expected`.
    pub fn get_value(&self, key: &str, expected: ParamType) -> Result<&Value, ParameterError> {
        let param = self
            .entries
            .get(key)
            .ok_or_else(|| ParameterError::MissingKey {
                key: key.to_string(),
            })?;

        let found = param.value.param_type();
        if found != expected {
            return Err(ParameterError::TypeMismatch {
                key: key.to_string(),
                expected,
                found,
            });
        }
        Ok(&param.value)
    }

    /// Canonical text form, `<name=type(value);...>`, including untracked
    /// entries (marked with `untracked `).
    pub fn to_canonical_string(&self) -> String {
        self.render(true)
    }

    pub(crate) fn render(&self, include_untracked: bool) -> String {
        let mut out = String::from("<");
        for (name, param) in &self.entries {
            if !param.tracked && !include_untracked {
                continue;
            }
            if !param.tracked {
                out.push_str("untracked ");
            }
            out.push_str(&format!(
                "{}={}({});",
                name,
                param.value.param_type(),
                param.value.render(include_untracked)
            ));
        }
        out.push('>');
        out
    }

    /// Identity of this set, computed over tracked entries only.
    pub fn id(&self) -> ParameterSetId {
        ParameterSetId(fnv1a(self.render(false).as_bytes()))
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

/// Mutable accumulator that yields frozen [`ParameterSet`]s.
#[derive(Debug, Clone, Default)]
pub struct ParameterSetBuilder {
    entries: BTreeMap<String, Parameter>,
}

impl ParameterSetBuilder {
    pub fn new() -> Self {
        ParameterSetBuilder::default()
    }

    /// Declare a tracked parameter.
    ///
    /// Re-declaring a name with the same type replaces the value; with a
    /// different type it fails with [`ParameterError::DuplicateKey`].
    pub fn set<T: ParamValue>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> Result<&mut Self, ParameterError> {
        self.set_value(key, value.into_value(), true)
    }

    /// Declare an untracked parameter.
    pub fn untracked<T: ParamValue>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> Result<&mut Self, ParameterError> {
        self.set_value(key, value.into_value(), false)
    }

    pub fn set_value(
        &mut self,
        key: impl Into<String>,
        value: Value,
        tracked: bool,
    ) -> Result<&mut Self, ParameterError> {
        let key = key.into();
        if let Some(existing) = self.entries.get(&key) {
            let existing_type = existing.value.param_type();
            if existing_type != value.param_type() {
                return Err(ParameterError::DuplicateKey {
                    key,
                    existing: existing_type,
                    requested: value.param_type(),
                });
            }
        }
        self.entries.insert(key, Parameter { value, tracked });
        Ok(self)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Freeze the current entries into a new set. The builder stays usable.
    pub fn build(&self) -> ParameterSet {
        ParameterSet {
            entries: self.entries.clone(),
        }
    }
}

// ============================================================================
// Serialized form
// ============================================================================

/// One parameter as written in a configuration file: exactly one typed
/// field, optionally wrapped in `untracked`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[doc(hidden)]
pub struct RawParameter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    int32: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uint32: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    double: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bool: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_in_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vint32: Option<Vec<i32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vuint32: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vdouble: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vbool: Option<Vec<bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vstring: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vfile_in_path: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pset: Option<ParameterSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    untracked: Option<Box<RawParameter>>,
}

impl RawParameter {
    /// Every typed field that is set, in declaration order.
    fn into_values(self) -> Vec<Value> {
        let mut values = Vec::new();
        if let Some(v) = self.int32 {
            values.push(Value::Int32(v));
        }
        if let Some(v) = self.uint32 {
            values.push(Value::Uint32(v));
        }
        if let Some(v) = self.double {
            values.push(Value::Double(v));
        }
        if let Some(v) = self.bool {
            values.push(Value::Bool(v));
        }
        if let Some(v) = self.string {
            values.push(Value::String(v));
        }
        if let Some(v) = self.file_in_path {
            values.push(Value::FileInPath(FileInPath::new(v)));
        }
        if let Some(v) = self.vint32 {
            values.push(Value::VInt32(v));
        }
        if let Some(v) = self.vuint32 {
            values.push(Value::VUint32(v));
        }
        if let Some(v) = self.vdouble {
            values.push(Value::VDouble(v));
        }
        if let Some(v) = self.vbool {
            values.push(Value::VBool(v));
        }
        if let Some(v) = self.vstring {
            values.push(Value::VString(v));
        }
        if let Some(v) = self.vfile_in_path {
            values.push(Value::VFileInPath(v.into_iter().map(FileInPath::new).collect()));
        }
        if let Some(v) = self.pset {
            values.push(Value::PSet(v));
        }
        values
    }

    fn into_value(self) -> Result<Value, String> {
        let mut values = self.into_values();
        match values.len() {
            1 => Ok(values.remove(0)),
            0 => Err("expected exactly one typed value, found none".to_string()),
            n => Err(format!("expected exactly one typed value, found {}", n)),
        }
    }

    fn from_value(value: Value) -> Self {
        let mut raw = RawParameter::default();
        match value {
            Value::Int32(v) => raw.int32 = Some(v),
            Value::Uint32(v) => raw.uint32 = Some(v),
            Value::Double(v) => raw.double = Some(v),
            Value::Bool(v) => raw.bool = Some(v),
            Value::String(v) => raw.string = Some(v),
            Value::FileInPath(v) => raw.file_in_path = Some(v.as_str().to_string()),
            Value::VInt32(v) => raw.vint32 = Some(v),
            Value::VUint32(v) => raw.vuint32 = Some(v),
            Value::VDouble(v) => raw.vdouble = Some(v),
            Value::VBool(v) => raw.vbool = Some(v),
            Value::VString(v) => raw.vstring = Some(v),
            Value::VFileInPath(v) => {
                raw.vfile_in_path = Some(v.iter().map(|f| f.as_str().to_string()).collect())
            }
            Value::PSet(v) => raw.pset = Some(v),
        }
        raw
    }
}

impl TryFrom<BTreeMap<String, RawParameter>> for ParameterSet {
    type Error = String;

    fn try_from(raw: BTreeMap<String, RawParameter>) -> Result<Self, Self::Error> {
        let mut entries = BTreeMap::new();
        for (name, mut param) in raw {
            let (inner, tracked) = match param.untracked.take() {
                Some(inner) => {
                    if !param.into_values().is_empty() {
                        return Err(format!(
                            "parameter '{}': 'untracked' cannot be combined with another value",
                            name
                        ));
                    }
                    if inner.untracked.is_some() {
                        return Err(format!("parameter '{}': nested 'untracked'", name));
                    }
                    (*inner, false)
                }
                None => (param, true),
            };
            let value = inner
                .into_value()
                .map_err(|e| format!("parameter '{}': {}", name, e))?;
            entries.insert(name, Parameter { value, tracked });
        }
        Ok(ParameterSet { entries })
    }
}

impl From<ParameterSet> for BTreeMap<String, RawParameter> {
    fn from(pset: ParameterSet) -> Self {
        pset.entries
            .into_iter()
            .map(|(name, param)| {
                let raw = RawParameter::from_value(param.value);
                let raw = if param.tracked {
                    raw
                } else {
                    RawParameter {
                        untracked: Some(Box::new(raw)),
                        ..RawParameter::default()
                    }
                };
                (name, raw)
            })
            .collect()
    }
}
