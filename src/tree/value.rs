//! Ordered value tree produced by the schema-driven reader.

use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Number, Value as Json};

use crate::serialized::PPtr;
use crate::util::{Error, Result};

/// One decoded schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    String(String),
    /// `vector<UInt8>` payloads and captured typeless data.
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    /// Key/value pairs in stream order; keys need not be strings.
    Map(Vec<(Value, Value)>),
    /// Nested record, fields in schema order.
    Record(IndexMap<String, Value>),
    /// Typeless data that was skipped: payload offset within the object and its length.
    Blob { offset: u64, size: u64 },
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
            Self::Record(_) => "record",
            Self::Blob { .. } => "blob",
        }
    }

    /// Field of a record.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Record(fields) => fields.get(name),
            _ => None,
        }
    }

    /// Field of a record, or [`Error::FieldNotFound`].
    pub fn field(&self, name: &str) -> Result<&Value> {
        self.get(name).ok_or_else(|| Error::FieldNotFound(name.to_string()))
    }

    fn mismatch(&self, expected: &str) -> Error {
        Error::TypeMismatch { expected: expected.to_string(), actual: self.type_name().to_string() }
    }

    pub fn as_i64(&self) -> Result<i64> {
        match *self {
            Self::Int(v) => Ok(v),
            Self::UInt(v) => i64::try_from(v).map_err(|_| self.mismatch("i64")),
            Self::Bool(v) => Ok(v as i64),
            _ => Err(self.mismatch("integer")),
        }
    }

    pub fn as_u64(&self) -> Result<u64> {
        match *self {
            Self::UInt(v) => Ok(v),
            Self::Int(v) => u64::try_from(v).map_err(|_| self.mismatch("u64")),
            Self::Bool(v) => Ok(v as u64),
            _ => Err(self.mismatch("integer")),
        }
    }

    pub fn as_i32(&self) -> Result<i32> {
        let v = self.as_i64()?;
        i32::try_from(v).map_err(|_| self.mismatch("i32"))
    }

    pub fn as_u32(&self) -> Result<u32> {
        let v = self.as_u64()?;
        u32::try_from(v).map_err(|_| self.mismatch("u32"))
    }

    pub fn as_f32(&self) -> Result<f32> {
        match *self {
            Self::Float(v) => Ok(v),
            Self::Double(v) => Ok(v as f32),
            Self::Int(v) => Ok(v as f32),
            Self::UInt(v) => Ok(v as f32),
            _ => Err(self.mismatch("float")),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match *self {
            Self::Bool(v) => Ok(v),
            Self::Int(v) => Ok(v != 0),
            Self::UInt(v) => Ok(v != 0),
            _ => Err(self.mismatch("bool")),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Self::String(s) => Ok(s),
            _ => Err(self.mismatch("string")),
        }
    }

    pub fn as_array(&self) -> Result<&[Value]> {
        match self {
            Self::Array(items) => Ok(items),
            _ => Err(self.mismatch("array")),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8]> {
        match self {
            Self::Bytes(b) => Ok(b),
            _ => Err(self.mismatch("bytes")),
        }
    }

    pub fn as_map(&self) -> Result<&[(Value, Value)]> {
        match self {
            Self::Map(pairs) => Ok(pairs),
            _ => Err(self.mismatch("map")),
        }
    }

    /// `{m_FileID, m_PathID}` record.
    pub fn as_pptr<T>(&self) -> Result<PPtr<T>> {
        Ok(PPtr::new(self.field("m_FileID")?.as_i32()?, self.field("m_PathID")?.as_i64()?))
    }

    /// Structured-document form for dump tooling.
    pub fn to_json(&self) -> Json {
        match self {
            Self::Bool(v) => Json::Bool(*v),
            Self::Int(v) => Json::from(*v),
            Self::UInt(v) => Json::from(*v),
            Self::Float(v) => float_json(*v as f64),
            Self::Double(v) => float_json(*v),
            Self::String(s) => Json::String(s.clone()),
            Self::Bytes(b) => Json::Array(b.iter().map(|&x| Json::from(x)).collect()),
            Self::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Self::Map(pairs) => {
                if pairs.iter().all(|(k, _)| matches!(k, Value::String(_))) {
                    let mut map = JsonMap::with_capacity(pairs.len());
                    for (k, v) in pairs {
                        if let Value::String(k) = k {
                            map.insert(k.clone(), v.to_json());
                        }
                    }
                    Json::Object(map)
                } else {
                    Json::Array(
                        pairs
                            .iter()
                            .map(|(k, v)| {
                                let mut pair = JsonMap::with_capacity(2);
                                pair.insert("first".into(), k.to_json());
                                pair.insert("second".into(), v.to_json());
                                Json::Object(pair)
                            })
                            .collect(),
                    )
                }
            }
            Self::Record(fields) => {
                Json::Object(fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
            }
            Self::Blob { offset, size } => {
                let mut blob = JsonMap::with_capacity(2);
                blob.insert("Offset".into(), Json::from(*offset));
                blob.insert("Size".into(), Json::from(*size));
                Json::Object(blob)
            }
        }
    }
}

fn float_json(v: f64) -> Json {
    if v.is_nan() {
        Json::String("NaN".into())
    } else if v.is_infinite() {
        Json::String(if v > 0.0 { "Infinity" } else { "-Infinity" }.into())
    } else {
        Number::from_f64(v).map(Json::Number).unwrap_or(Json::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accessors() {
        let mut fields = IndexMap::new();
        fields.insert("m_Name".to_string(), Value::String("Cube".into()));
        fields.insert("m_Count".to_string(), Value::UInt(7));
        let record = Value::Record(fields);

        assert_eq!(record.field("m_Name").unwrap().as_str().unwrap(), "Cube");
        assert_eq!(record.field("m_Count").unwrap().as_i32().unwrap(), 7);
        assert!(matches!(record.field("m_Missing"), Err(Error::FieldNotFound(_))));
        assert!(matches!(record.field("m_Name").unwrap().as_f32(), Err(Error::TypeMismatch { .. })));
        assert!(Value::Int(-1).as_u32().is_err());
    }

    #[test]
    fn test_json_form() {
        let mut fields = IndexMap::new();
        fields.insert("z".to_string(), Value::Float(f32::NAN));
        fields.insert("a".to_string(), Value::Double(f64::NEG_INFINITY));
        fields.insert("names".to_string(), Value::Map(vec![(Value::String("k".into()), Value::Int(1))]));
        fields.insert("ids".to_string(), Value::Map(vec![(Value::Int(3), Value::Bool(true))]));
        fields.insert("raw".to_string(), Value::Bytes(vec![1, 2]));
        let json = Value::Record(fields).to_json();

        assert_eq!(
            json,
            json!({
                "z": "NaN",
                "a": "-Infinity",
                "names": {"k": 1},
                "ids": [{"first": 3, "second": true}],
                "raw": [1, 2],
            })
        );
        // schema order survives
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["z", "a", "names", "ids", "raw"]);
    }

    #[test]
    fn test_pptr_field() {
        let mut fields = IndexMap::new();
        fields.insert("m_FileID".to_string(), Value::Int(1));
        fields.insert("m_PathID".to_string(), Value::Int(-5));
        let p: PPtr = Value::Record(fields).as_pptr().unwrap();
        assert_eq!((p.file_id, p.path_id), (1, -5));
    }
}
