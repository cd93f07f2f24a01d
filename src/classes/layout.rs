//! Version-gated field layouts and tree field access.
//!
//! Binary decoders describe their optional fields as ordered [`FieldStep`]
//! tables: each step pairs a [`VersionGate`] with the action that reads the
//! field. Running a table against a version applies exactly the matching
//! steps, in order, so each bracket can be exercised on its own.
//!
//! Schema decoders copy fields out of a [`Value`] tree through
//! [`TreeFields`] and [`FromTree`].

use tracing::trace;

use crate::serialized::ObjectReader;
use crate::tree::Value;
use crate::util::{Aabb, Error, Mat4, Quat, Rect, Result, Vec2, Vec3, Vec4, VersionGate};

/// One gated field (or run of fields) of a binary layout.
pub struct FieldStep<T> {
    pub name: &'static str,
    pub gate: VersionGate,
    pub read: fn(&mut ObjectReader<'_>, &mut T) -> Result<()>,
}

impl<T> FieldStep<T> {
    pub const fn new(name: &'static str, gate: VersionGate, read: fn(&mut ObjectReader<'_>, &mut T) -> Result<()>) -> Self {
        Self { name, gate, read }
    }
}

/// Apply every step whose gate matches the reader's version.
pub fn run_steps<T>(steps: &[FieldStep<T>], r: &mut ObjectReader<'_>, target: &mut T) -> Result<()> {
    let version = r.version();
    for step in steps {
        if !step.gate.matches(version) {
            continue;
        }
        trace!(field = step.name, at = r.position(), "read");
        (step.read)(r, target).map_err(|e| match e {
            Error::UnexpectedEof(_) | Error::InvalidStructure(_) => {
                Error::invalid(format!("{}: {e}", step.name))
            }
            other => other,
        })?;
    }
    Ok(())
}

/// Names of the steps a version would apply.
pub fn active_steps<T>(steps: &[FieldStep<T>], version: &crate::util::UnityVersion) -> Vec<&'static str> {
    steps.iter().filter(|s| s.gate.matches(version)).map(|s| s.name).collect()
}

/// Conversion from a schema-decoded node.
pub trait FromTree: Sized {
    fn from_tree(v: &Value) -> Result<Self>;
}

impl FromTree for f32 {
    fn from_tree(v: &Value) -> Result<Self> {
        v.as_f32()
    }
}

impl FromTree for i32 {
    fn from_tree(v: &Value) -> Result<Self> {
        v.as_i32()
    }
}

impl FromTree for u32 {
    fn from_tree(v: &Value) -> Result<Self> {
        v.as_u32()
    }
}

impl FromTree for String {
    fn from_tree(v: &Value) -> Result<Self> {
        v.as_str().map(str::to_owned)
    }
}

impl FromTree for Vec2 {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Vec2::new(v.f32_of("x")?, v.f32_of("y")?))
    }
}

/// Also accepts a 4-component record and drops `w`.
impl FromTree for Vec3 {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Vec3::new(v.f32_of("x")?, v.f32_of("y")?, v.f32_of("z")?))
    }
}

impl FromTree for Vec4 {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Vec4::new(v.f32_of("x")?, v.f32_of("y")?, v.f32_of("z")?, v.f32_of("w")?))
    }
}

impl FromTree for Quat {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Quat::from_xyzw(v.f32_of("x")?, v.f32_of("y")?, v.f32_of("z")?, v.f32_of("w")?))
    }
}

impl FromTree for Rect {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Rect {
            x: v.f32_of("x")?,
            y: v.f32_of("y")?,
            width: v.f32_of("width")?,
            height: v.f32_of("height")?,
        })
    }
}

impl FromTree for Aabb {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Aabb::new(v.parse("m_Center")?, v.parse("m_Extent")?))
    }
}

impl<T: FromTree> FromTree for Vec<T> {
    fn from_tree(v: &Value) -> Result<Self> {
        v.as_array()?.iter().map(T::from_tree).collect()
    }
}

/// `Matrix4x4f` records name their cells `e<row><col>`.
impl FromTree for Mat4 {
    fn from_tree(v: &Value) -> Result<Self> {
        let mut cols = [0f32; 16];
        for col in 0..4 {
            for row in 0..4 {
                cols[col * 4 + row] = v.f32_of(&format!("e{row}{col}"))?;
            }
        }
        Ok(Mat4::from_cols_array(&cols))
    }
}

/// Field access helpers over record nodes.
pub trait TreeFields {
    fn f32_of(&self, name: &str) -> Result<f32>;
    fn i32_of(&self, name: &str) -> Result<i32>;
    fn u32_of(&self, name: &str) -> Result<u32>;
    fn i64_of(&self, name: &str) -> Result<i64>;
    fn bool_of(&self, name: &str) -> Result<bool>;
    fn string_of(&self, name: &str) -> Result<String>;
    fn parse<T: FromTree>(&self, name: &str) -> Result<T>;
    /// Optional field: `None` when absent from this schema version.
    fn parse_opt<T: FromTree>(&self, name: &str) -> Result<Option<T>>;
    fn array_of<T: FromTree>(&self, name: &str) -> Result<Vec<T>>;
    /// `vector<UInt8>`, or any integer array.
    fn bytes_of(&self, name: &str) -> Result<Vec<u8>>;
}

impl TreeFields for Value {
    fn f32_of(&self, name: &str) -> Result<f32> {
        self.field(name)?.as_f32()
    }

    fn i32_of(&self, name: &str) -> Result<i32> {
        self.field(name)?.as_i32()
    }

    fn u32_of(&self, name: &str) -> Result<u32> {
        self.field(name)?.as_u32()
    }

    fn i64_of(&self, name: &str) -> Result<i64> {
        self.field(name)?.as_i64()
    }

    fn bool_of(&self, name: &str) -> Result<bool> {
        self.field(name)?.as_bool()
    }

    fn string_of(&self, name: &str) -> Result<String> {
        Ok(self.field(name)?.as_str()?.to_owned())
    }

    fn parse<T: FromTree>(&self, name: &str) -> Result<T> {
        T::from_tree(self.field(name)?)
    }

    fn parse_opt<T: FromTree>(&self, name: &str) -> Result<Option<T>> {
        self.get(name).map(T::from_tree).transpose()
    }

    fn array_of<T: FromTree>(&self, name: &str) -> Result<Vec<T>> {
        self.field(name)?.as_array()?.iter().map(T::from_tree).collect()
    }

    fn bytes_of(&self, name: &str) -> Result<Vec<u8>> {
        match self.field(name)? {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Array(items) => items
                .iter()
                .map(|x| x.as_u32().and_then(|b| u8::try_from(b).map_err(|_| Error::invalid(format!("{name}: byte out of range")))))
                .collect(),
            other => Err(Error::TypeMismatch { expected: "bytes".into(), actual: other.type_name().into() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialized::testing::{member, Payload};
    use crate::util::{ver, UnityVersion};
    use indexmap::IndexMap;

    #[derive(Default, Debug)]
    struct Gated {
        legacy: Option<i32>,
        modern: Option<i32>,
    }

    const STEPS: &[FieldStep<Gated>] = &[
        FieldStep::new("m_Legacy", VersionGate::Before(ver(4, 3)), |r, p| {
            p.legacy = Some(r.read_i32()?);
            Ok(())
        }),
        FieldStep::new("m_Modern", VersionGate::Since(ver(4, 3)), |r, p| {
            p.modern = Some(r.read_i32()?);
            Ok(())
        }),
    ];

    #[test]
    fn test_gate_brackets() {
        let v42: UnityVersion = "4.2.2f1".parse().unwrap();
        let v43: UnityVersion = "4.3.0f4".parse().unwrap();
        assert_eq!(active_steps(STEPS, &v42), ["m_Legacy"]);
        assert_eq!(active_steps(STEPS, &v43), ["m_Modern"]);
    }

    #[test]
    fn test_run_steps_reads_one_bracket() {
        let bytes = Payload::new().i32(11).i32(22).finish();
        for (version, legacy, modern) in [("4.2.2f1", Some(11), None), ("4.3.0f4", None, Some(11))] {
            let file = member(version, 1, &bytes);
            let mut r = file.object_reader(&file.objects[0]).unwrap();
            let mut target = Gated::default();
            run_steps(STEPS, &mut r, &mut target).unwrap();
            assert_eq!((target.legacy, target.modern), (legacy, modern), "{version}");
            assert_eq!(r.position(), 4, "{version}");
        }
    }

    fn rec(fields: &[(&str, Value)]) -> Value {
        Value::Record(fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect::<IndexMap<_, _>>())
    }

    #[test]
    fn test_tree_fields() {
        let v = rec(&[
            ("m_Offset", rec(&[("x", Value::Float(1.0)), ("y", Value::Float(2.0))])),
            ("m_Data", Value::Array(vec![Value::UInt(1), Value::UInt(255)])),
            ("m_Tags", Value::Array(vec![Value::String("a".into())])),
        ]);
        assert_eq!(v.parse::<Vec2>("m_Offset").unwrap(), Vec2::new(1.0, 2.0));
        assert_eq!(v.bytes_of("m_Data").unwrap(), [1, 255]);
        assert_eq!(v.array_of::<String>("m_Tags").unwrap(), ["a"]);
        assert!(v.parse_opt::<Vec4>("m_Border").unwrap().is_none());
        assert!(v.parse::<Vec3>("m_Offset").is_err());
    }
}
