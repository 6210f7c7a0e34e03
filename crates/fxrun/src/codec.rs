//! # JSON Codec
//!
//! Translates between JSON payloads and `wasmtime::component::Val`, guided by the
//! function's declared `Type`. The host needs no static knowledge of function types.
//!
//! A project picks its JSON binding library by shipping that library's marker type on
//! the classpath. The configured list of libraries is walked in order and the first
//! one present wins. Libraries differ in how record field names appear in JSON.
//!
//! ## Mapping
//! - option: `null` or the value
//! - result: `{"ok": v}` or `{"err": v}`
//! - variant: `"case"` or `{"case": payload}`
//! - enum: `"case"`; flags: array of names; tuple and list: arrays
//! - char: one-character string
//!
//! ## Invariants
//! - **Recursion Safety**: nesting is bounded by `MAX_RECURSION_DEPTH`.
//! - **Type Strictness**: decoding checks every value against the expected `Type`.

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Number;
use serde_json::Value;
use tracing::info;
use tracing::warn;
use wasmtime::component::Type;
use wasmtime::component::Val;

use crate::environment::Environment;

const MAX_RECURSION_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The payload is not valid JSON.
    Malformed(String),
    /// A JSON value does not fit the expected type.
    Mismatch { path: String, expected: String, found: &'static str },
    /// A required record field is absent.
    MissingField { path: String, field: String },
    /// A variant, enum or flag name is not part of the type.
    UnknownCase { path: String, name: String },
    /// A number does not fit the expected numeric type.
    OutOfRange { path: String, expected: &'static str },
    /// The type or value cannot be represented in JSON at all.
    Unsupported(String),
    /// The nested depth of the value exceeded the safety limit.
    RecursionLimitExceeded,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(msg) => write!(f, "malformed JSON: {}", msg),
            Self::Mismatch { path, expected, found } => write!(f, "{}: expected {}, found {}", path, expected, found),
            Self::MissingField { path, field } => write!(f, "{}: missing field '{}'", path, field),
            Self::UnknownCase { path, name } => write!(f, "{}: unknown case '{}'", path, name),
            Self::OutOfRange { path, expected } => write!(f, "{}: number out of range for {}", path, expected),
            Self::Unsupported(what) => write!(f, "{} cannot be represented as JSON", what),
            Self::RecursionLimitExceeded => write!(f, "value nesting exceeds {} levels", MAX_RECURSION_DEPTH),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// How record field names appear in JSON. Field names are kebab-case in the type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldNaming {
    CamelCase,
    SnakeCase,
    KebabCase,
}

impl FieldNaming {
    pub fn apply(self, field: &str) -> String {
        match self {
            FieldNaming::KebabCase => field.to_string(),
            FieldNaming::SnakeCase => field.replace('-', "_"),
            FieldNaming::CamelCase => {
                let mut out = String::with_capacity(field.len());
                let mut upper = false;
                for c in field.chars() {
                    if c == '-' {
                        upper = true;
                    } else if upper {
                        out.extend(c.to_uppercase());
                        upper = false;
                    } else {
                        out.push(c);
                    }
                }
                out
            }
        }
    }
}

/// A supported JSON binding library.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonLibrary {
    pub name: String,
    /// Type whose presence on the classpath selects the library.
    pub marker: String,
    pub naming: FieldNaming,
}

impl JsonLibrary {
    pub fn new(name: &str, marker: &str, naming: FieldNaming) -> Self {
        Self {
            name: name.to_string(),
            marker: marker.to_string(),
            naming,
        }
    }

    /// Default precedence, most preferred first.
    pub fn defaults() -> Vec<JsonLibrary> {
        vec![
            JsonLibrary::new("camel-case", "sf.functions.json.CamelCase", FieldNaming::CamelCase),
            JsonLibrary::new("snake-case", "sf.functions.json.SnakeCase", FieldNaming::SnakeCase),
            JsonLibrary::new("kebab-case", "sf.functions.json.KebabCase", FieldNaming::KebabCase),
        ]
    }
}

/// Serializes and deserializes function values.
pub trait Codec: Send + Sync {
    fn library(&self) -> &JsonLibrary;

    /// Reads a payload into a value of `shape`.
    fn deserialize(&self, bytes: &[u8], shape: &Type) -> Result<Val>;

    /// Writes a value as a payload.
    fn serialize(&self, value: &Val) -> Result<Vec<u8>>;
}

/// Picks the first library whose marker type is on the classpath.
pub fn select(environment: &Environment, libraries: &[JsonLibrary]) -> Option<Arc<dyn Codec>> {
    let Some(library) = libraries.iter().find(|lib| environment.contains(&lib.marker)) else {
        warn!(project = %environment.project(), "no supported JSON library on the classpath");
        return None;
    };
    info!(project = %environment.project(), library = %library.name, "JSON library selected");
    Some(Arc::new(JsonCodec::new(library.clone())))
}

/// [`Codec`] driven by a [`JsonLibrary`]'s conventions.
#[derive(Clone, Debug)]
pub struct JsonCodec {
    library: JsonLibrary,
}

impl JsonCodec {
    pub fn new(library: JsonLibrary) -> Self {
        Self { library }
    }

    /// Converts a JSON value into a value of `shape`.
    pub fn from_json(&self, value: &Value, shape: &Type) -> Result<Val> {
        self.from_json_impl(value, shape, "$", 0)
    }

    /// Converts a value into JSON.
    pub fn to_json(&self, value: &Val) -> Result<Value> {
        self.to_json_impl(value, 0)
    }

    fn from_json_impl(&self, value: &Value, ty: &Type, path: &str, depth: usize) -> Result<Val> {
        if depth > MAX_RECURSION_DEPTH {
            return Err(Error::RecursionLimitExceeded);
        }

        let mismatch = || Error::Mismatch {
            path: path.to_string(),
            expected: describe(ty),
            found: json_desc(value),
        };

        match ty {
            Type::Bool => value.as_bool().map(Val::Bool).ok_or_else(mismatch),
            Type::U8 => Ok(Val::U8(unsigned(value, path, "u8", mismatch)?)),
            Type::U16 => Ok(Val::U16(unsigned(value, path, "u16", mismatch)?)),
            Type::U32 => Ok(Val::U32(unsigned(value, path, "u32", mismatch)?)),
            Type::U64 => Ok(Val::U64(unsigned(value, path, "u64", mismatch)?)),
            Type::S8 => Ok(Val::S8(signed(value, path, "s8", mismatch)?)),
            Type::S16 => Ok(Val::S16(signed(value, path, "s16", mismatch)?)),
            Type::S32 => Ok(Val::S32(signed(value, path, "s32", mismatch)?)),
            Type::S64 => Ok(Val::S64(signed(value, path, "s64", mismatch)?)),
            Type::Float32 => {
                let v = value.as_f64().ok_or_else(mismatch)?;
                let narrowed = v as f32;
                if !narrowed.is_finite() {
                    return Err(Error::OutOfRange {
                        path: path.to_string(),
                        expected: "f32",
                    });
                }
                Ok(Val::Float32(narrowed))
            }
            Type::Float64 => value.as_f64().map(Val::Float64).ok_or_else(mismatch),
            Type::Char => {
                let s = value.as_str().ok_or_else(mismatch)?;
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Val::Char(c)),
                    _ => Err(mismatch()),
                }
            }
            Type::String => value.as_str().map(|s| Val::String(s.to_string())).ok_or_else(mismatch),

            Type::List(handle) => {
                let items = value.as_array().ok_or_else(mismatch)?;
                let inner = handle.ty();
                let list = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.from_json_impl(item, &inner, &format!("{}[{}]", path, i), depth + 1))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Val::List(list))
            }

            Type::Tuple(handle) => {
                let items = value.as_array().ok_or_else(mismatch)?;
                let types: Vec<Type> = handle.types().collect();
                if items.len() != types.len() {
                    return Err(mismatch());
                }
                let tuple = items
                    .iter()
                    .zip(types.iter())
                    .enumerate()
                    .map(|(i, (item, ty))| self.from_json_impl(item, ty, &format!("{}[{}]", path, i), depth + 1))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Val::Tuple(tuple))
            }

            Type::Record(handle) => {
                let object = value.as_object().ok_or_else(mismatch)?;
                let mut fields = Vec::new();
                for field in handle.fields() {
                    let key = self.library.naming.apply(field.name);
                    let field_path = format!("{}.{}", path, key);
                    let val = match object.get(&key) {
                        Some(v) => self.from_json_impl(v, &field.ty, &field_path, depth + 1)?,
                        None if matches!(field.ty, Type::Option(_)) => Val::Option(None),
                        None => {
                            return Err(Error::MissingField {
                                path: path.to_string(),
                                field: key,
                            });
                        }
                    };
                    fields.push((field.name.to_string(), val));
                }
                Ok(Val::Record(fields))
            }

            Type::Variant(handle) => {
                let (name, payload) = tagged(value).ok_or_else(mismatch)?;
                let case = handle
                    .cases()
                    .find(|c| c.name == name)
                    .ok_or_else(|| Error::UnknownCase {
                        path: path.to_string(),
                        name: name.to_string(),
                    })?;
                let payload = match (&case.ty, payload) {
                    (Some(ty), Some(v)) => {
                        Some(Box::new(self.from_json_impl(v, ty, &format!("{}.{}", path, name), depth + 1)?))
                    }
                    (None, None) | (None, Some(Value::Null)) => None,
                    _ => return Err(mismatch()),
                };
                Ok(Val::Variant(name.to_string(), payload))
            }

            Type::Enum(handle) => {
                let name = value.as_str().ok_or_else(mismatch)?;
                if handle.names().any(|n| n == name) {
                    Ok(Val::Enum(name.to_string()))
                } else {
                    Err(Error::UnknownCase {
                        path: path.to_string(),
                        name: name.to_string(),
                    })
                }
            }

            Type::Option(handle) => {
                if value.is_null() {
                    Ok(Val::Option(None))
                } else {
                    let inner = self.from_json_impl(value, &handle.ty(), path, depth + 1)?;
                    Ok(Val::Option(Some(Box::new(inner))))
                }
            }

            Type::Result(handle) => {
                let object = value.as_object().filter(|o| o.len() == 1).ok_or_else(mismatch)?;
                let (ok, payload, ty) = match (object.get("ok"), object.get("err")) {
                    (Some(v), None) => (true, v, handle.ok()),
                    (None, Some(v)) => (false, v, handle.err()),
                    _ => return Err(mismatch()),
                };
                let payload = match ty {
                    Some(ty) => Some(Box::new(self.from_json_impl(payload, &ty, path, depth + 1)?)),
                    None if payload.is_null() => None,
                    None => return Err(mismatch()),
                };
                Ok(Val::Result(if ok { Ok(payload) } else { Err(payload) }))
            }

            Type::Flags(handle) => {
                let items = value.as_array().ok_or_else(mismatch)?;
                let mut active = Vec::with_capacity(items.len());
                for item in items {
                    let name = item.as_str().ok_or_else(mismatch)?;
                    if !handle.names().any(|n| n == name) {
                        return Err(Error::UnknownCase {
                            path: path.to_string(),
                            name: name.to_string(),
                        });
                    }
                    active.push(name.to_string());
                }
                Ok(Val::Flags(active))
            }

            Type::Own(_) | Type::Borrow(_) | Type::Future(_) | Type::Stream(_) | Type::ErrorContext => {
                Err(Error::Unsupported(describe(ty)))
            }
        }
    }

    fn to_json_impl(&self, val: &Val, depth: usize) -> Result<Value> {
        if depth > MAX_RECURSION_DEPTH {
            return Err(Error::RecursionLimitExceeded);
        }

        let json = match val {
            Val::Bool(b) => Value::Bool(*b),
            Val::U8(v) => Value::from(*v),
            Val::U16(v) => Value::from(*v),
            Val::U32(v) => Value::from(*v),
            Val::U64(v) => Value::from(*v),
            Val::S8(v) => Value::from(*v),
            Val::S16(v) => Value::from(*v),
            Val::S32(v) => Value::from(*v),
            Val::S64(v) => Value::from(*v),
            Val::Float32(v) => float(f64::from(*v))?,
            Val::Float64(v) => float(*v)?,
            Val::Char(c) => Value::String(c.to_string()),
            Val::String(s) => Value::String(s.clone()),
            Val::List(items) | Val::Tuple(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.to_json_impl(item, depth + 1))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Val::Record(fields) => {
                let mut object = Map::new();
                for (name, value) in fields {
                    object.insert(self.library.naming.apply(name), self.to_json_impl(value, depth + 1)?);
                }
                Value::Object(object)
            }
            Val::Variant(name, payload) => match payload {
                Some(v) => {
                    let mut object = Map::new();
                    object.insert(name.clone(), self.to_json_impl(v, depth + 1)?);
                    Value::Object(object)
                }
                None => Value::String(name.clone()),
            },
            Val::Enum(name) => Value::String(name.clone()),
            Val::Option(opt) => match opt {
                Some(v) => self.to_json_impl(v, depth + 1)?,
                None => Value::Null,
            },
            Val::Result(res) => {
                let (tag, payload) = match res {
                    Ok(v) => ("ok", v),
                    Err(v) => ("err", v),
                };
                let payload = match payload {
                    Some(v) => self.to_json_impl(v, depth + 1)?,
                    None => Value::Null,
                };
                let mut object = Map::new();
                object.insert(tag.to_string(), payload);
                Value::Object(object)
            }
            Val::Flags(names) => Value::Array(names.iter().cloned().map(Value::String).collect()),
            Val::Resource(_) | Val::Future(_) | Val::Stream(_) | Val::ErrorContext(_) => {
                return Err(Error::Unsupported(val_desc(val).into()));
            }
        };
        Ok(json)
    }
}

impl Codec for JsonCodec {
    fn library(&self) -> &JsonLibrary {
        &self.library
    }

    fn deserialize(&self, bytes: &[u8], shape: &Type) -> Result<Val> {
        let value: Value = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(bytes).map_err(|e| Error::Malformed(e.to_string()))?
        };
        self.from_json(&value, shape)
    }

    fn serialize(&self, value: &Val) -> Result<Vec<u8>> {
        let json = self.to_json(value)?;
        serde_json::to_vec(&json).map_err(|e| Error::Unsupported(e.to_string()))
    }
}

/// Splits a variant encoding into its case name and optional payload.
fn tagged(value: &Value) -> Option<(&str, Option<&Value>)> {
    match value {
        Value::String(name) => Some((name.as_str(), None)),
        Value::Object(object) if object.len() == 1 => object.iter().next().map(|(k, v)| (k.as_str(), Some(v))),
        _ => None,
    }
}

fn unsigned<T: TryFrom<u64>>(value: &Value, path: &str, expected: &'static str, mismatch: impl Fn() -> Error) -> Result<T> {
    let n = value.as_u64().ok_or_else(|| {
        if value.is_i64() {
            Error::OutOfRange {
                path: path.to_string(),
                expected,
            }
        } else {
            mismatch()
        }
    })?;
    T::try_from(n).map_err(|_| Error::OutOfRange {
        path: path.to_string(),
        expected,
    })
}

fn signed<T: TryFrom<i64>>(value: &Value, path: &str, expected: &'static str, mismatch: impl Fn() -> Error) -> Result<T> {
    let n = value.as_i64().ok_or_else(|| {
        if value.is_u64() {
            Error::OutOfRange {
                path: path.to_string(),
                expected,
            }
        } else {
            mismatch()
        }
    })?;
    T::try_from(n).map_err(|_| Error::OutOfRange {
        path: path.to_string(),
        expected,
    })
}

fn float(v: f64) -> Result<Value> {
    Number::from_f64(v)
        .map(Value::Number)
        .ok_or_else(|| Error::Unsupported(format!("non-finite float {}", v)))
}

fn json_desc(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Human-readable rendering of a component type.
pub fn describe(ty: &Type) -> String {
    match ty {
        Type::Bool => "bool".into(),
        Type::U8 => "u8".into(),
        Type::U16 => "u16".into(),
        Type::U32 => "u32".into(),
        Type::U64 => "u64".into(),
        Type::S8 => "s8".into(),
        Type::S16 => "s16".into(),
        Type::S32 => "s32".into(),
        Type::S64 => "s64".into(),
        Type::Float32 => "f32".into(),
        Type::Float64 => "f64".into(),
        Type::Char => "char".into(),
        Type::String => "string".into(),
        Type::List(h) => format!("list<{}>", describe(&h.ty())),
        Type::Tuple(h) => format!("tuple<{}>", h.types().map(|t| describe(&t)).collect::<Vec<_>>().join(", ")),
        Type::Record(h) => format!(
            "record {{ {} }}",
            h.fields().map(|f| format!("{}: {}", f.name, describe(&f.ty))).collect::<Vec<_>>().join(", ")
        ),
        Type::Variant(h) => format!(
            "variant {{ {} }}",
            h.cases()
                .map(|c| match &c.ty {
                    Some(t) => format!("{}({})", c.name, describe(t)),
                    None => c.name.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Type::Enum(h) => format!("enum {{ {} }}", h.names().collect::<Vec<_>>().join(", ")),
        Type::Flags(h) => format!("flags {{ {} }}", h.names().collect::<Vec<_>>().join(", ")),
        Type::Option(h) => format!("option<{}>", describe(&h.ty())),
        Type::Result(h) => {
            let ok = h.ok().map_or("_".to_string(), |t| describe(&t));
            let err = h.err().map_or("_".to_string(), |t| describe(&t));
            format!("result<{}, {}>", ok, err)
        }
        Type::Own(_) => "own<resource>".into(),
        Type::Borrow(_) => "borrow<resource>".into(),
        Type::Future(_) => "future".into(),
        Type::Stream(_) => "stream".into(),
        Type::ErrorContext => "error-context".into(),
    }
}

fn val_desc(val: &Val) -> &'static str {
    match val {
        Val::Resource(_) => "resource",
        Val::Future(_) => "future",
        Val::Stream(_) => "stream",
        Val::ErrorContext(_) => "error-context",
        _ => "value",
    }
}
