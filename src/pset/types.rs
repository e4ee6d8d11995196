//! The fixed catalog of parameter types.
//!
//! Every parameter stored in a [`ParameterSet`] carries one of these types.
//! The type is fixed when the parameter is declared and checked on every
//! read, so a module asking for a `double` never silently receives an
//! `int32`.

use std::fmt;

use super::file_in_path::FileInPath;
use super::ParameterSet;

/// Type tag of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    Int32,
    Uint32,
    Double,
    Bool,
    String,
    FileInPath,
    VInt32,
    VUint32,
    VDouble,
    VBool,
    VString,
    VFileInPath,
    PSet,
}

impl ParamType {
    /// Name used in configuration files and canonical renderings.
    pub fn name(&self) -> &'static str {
        match self {
            ParamType::Int32 => "int32",
            ParamType::Uint32 => "uint32",
            ParamType::Double => "double",
            ParamType::Bool => "bool",
            ParamType::String => "string",
            ParamType::FileInPath => "FileInPath",
            ParamType::VInt32 => "vint32",
            ParamType::VUint32 => "vuint32",
            ParamType::VDouble => "vdouble",
            ParamType::VBool => "vbool",
            ParamType::VString => "vstring",
            ParamType::VFileInPath => "vFileInPath",
            ParamType::PSet => "PSet",
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(
            self,
            ParamType::VInt32
                | ParamType::VUint32
                | ParamType::VDouble
                | ParamType::VBool
                | ParamType::VString
                | ParamType::VFileInPath
        )
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A typed parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int32(i32),
    Uint32(u32),
    Double(f64),
    Bool(bool),
    String(String),
    FileInPath(FileInPath),
    VInt32(Vec<i32>),
    VUint32(Vec<u32>),
    VDouble(Vec<f64>),
    VBool(Vec<bool>),
    VString(Vec<String>),
    VFileInPath(Vec<FileInPath>),
    PSet(ParameterSet),
}

impl Value {
    pub fn param_type(&self) -> ParamType {
        match self {
            Value::Int32(_) => ParamType::Int32,
            Value::Uint32(_) => ParamType::Uint32,
            Value::Double(_) => ParamType::Double,
            Value::Bool(_) => ParamType::Bool,
            Value::String(_) => ParamType::String,
            Value::FileInPath(_) => ParamType::FileInPath,
            Value::VInt32(_) => ParamType::VInt32,
            Value::VUint32(_) => ParamType::VUint32,
            Value::VDouble(_) => ParamType::VDouble,
            Value::VBool(_) => ParamType::VBool,
            Value::VString(_) => ParamType::VString,
            Value::VFileInPath(_) => ParamType::VFileInPath,
            Value::PSet(_) => ParamType::PSet,
        }
    }

    /// Render the value part of the canonical form, e.g. `{1,2,3}`.
    ///
    /// Nested sets include untracked entries only when `include_untracked`
    /// is set.
    pub(crate) fn render(&self, include_untracked: bool) -> String {
        fn list<T: fmt::Display>(items: &[T]) -> String {
            let parts: Vec<String> = items.iter().map(|i| i.to_string()).collect();
            format!("{{{}}}", parts.join(","))
        }
        fn quoted<T: fmt::Display>(items: &[T]) -> String {
            let parts: Vec<String> = items.iter().map(|i| format!("{:?}", i.to_string())).collect();
            format!("{{{}}}", parts.join(","))
        }

        match self {
            Value::Int32(v) => v.to_string(),
            Value::Uint32(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::Bool(v) => v.to_string(),
            Value::String(v) => format!("{:?}", v),
            Value::FileInPath(v) => format!("{:?}", v.as_str()),
            Value::VInt32(v) => list(v),
            Value::VUint32(v) => list(v),
            Value::VDouble(v) => list(v),
            Value::VBool(v) => list(v),
            Value::VString(v) => quoted(v),
            Value::VFileInPath(v) => quoted(v),
            Value::PSet(p) => p.render(include_untracked),
        }
    }
}

/// Rust types that can be stored in and read back from a [`ParameterSet`].
pub trait ParamValue: Sized {
    /// The parameter type this Rust type maps to.
    const TYPE: ParamType;

    /// Extract the value if `value` holds exactly this type.
    fn from_value(value: &Value) -> Option<Self>;

    fn into_value(self) -> Value;
}

macro_rules! impl_param_value {
    ($ty:ty, $variant:ident) => {
        impl ParamValue for $ty {
            const TYPE: ParamType = ParamType::$variant;

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }
    };
}

impl_param_value!(i32, Int32);
impl_param_value!(u32, Uint32);
impl_param_value!(f64, Double);
impl_param_value!(bool, Bool);
impl_param_value!(String, String);
impl_param_value!(FileInPath, FileInPath);
impl_param_value!(Vec<i32>, VInt32);
impl_param_value!(Vec<u32>, VUint32);
impl_param_value!(Vec<f64>, VDouble);
impl_param_value!(Vec<bool>, VBool);
impl_param_value!(Vec<String>, VString);
impl_param_value!(Vec<FileInPath>, VFileInPath);
impl_param_value!(ParameterSet, PSet);
