//! Explicit keyframe curves and animation events.

use crate::classes::layout::{FromTree, TreeFields};
use crate::classes::packed::{PackedFloatVector, PackedIntVector, PackedQuatVector};
use crate::serialized::{ObjectReader, PPtr};
use crate::tree::Value;
use crate::util::{ver, ver1, Quat, Result, Vec3};

/// A value type a keyframe can carry.
pub trait CurveValue: Copy + Default + FromTree {
    fn read(r: &mut ObjectReader<'_>) -> Result<Self>;
}

impl CurveValue for f32 {
    fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        r.read_f32()
    }
}

impl CurveValue for Vec3 {
    fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        r.read_vec3()
    }
}

impl CurveValue for Quat {
    fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        r.read_quat()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Keyframe<T> {
    pub time: f32,
    pub value: T,
    pub in_slope: T,
    pub out_slope: T,
    /// Weighted tangents exist from 2018.1.
    pub weighted_mode: i32,
    pub in_weight: T,
    pub out_weight: T,
}

impl<T: CurveValue> Keyframe<T> {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let mut key = Keyframe {
            time: r.read_f32()?,
            value: T::read(r)?,
            in_slope: T::read(r)?,
            out_slope: T::read(r)?,
            ..Default::default()
        };
        if r.version().at_least(ver1(2018)) {
            key.weighted_mode = r.read_i32()?;
            key.in_weight = T::read(r)?;
            key.out_weight = T::read(r)?;
        }
        Ok(key)
    }
}

impl<T: CurveValue> FromTree for Keyframe<T> {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self {
            time: v.f32_of("time")?,
            value: v.parse("value")?,
            in_slope: v.parse("inSlope")?,
            out_slope: v.parse("outSlope")?,
            weighted_mode: v.parse_opt("weightedMode")?.unwrap_or_default(),
            in_weight: v.parse_opt("inWeight")?.unwrap_or_default(),
            out_weight: v.parse_opt("outWeight")?.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationCurve<T> {
    pub keys: Vec<Keyframe<T>>,
    pub pre_infinity: i32,
    pub post_infinity: i32,
    pub rotation_order: i32,
}

impl<T: CurveValue> AnimationCurve<T> {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let keys = r.read_objects(16, Keyframe::read)?;
        let pre_infinity = r.read_i32()?;
        let post_infinity = r.read_i32()?;
        let rotation_order = if r.version().at_least(ver(5, 3)) { r.read_i32()? } else { 0 };
        Ok(Self { keys, pre_infinity, post_infinity, rotation_order })
    }
}

impl<T: CurveValue> FromTree for AnimationCurve<T> {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self {
            keys: v.array_of("m_Curve")?,
            pre_infinity: v.i32_of("m_PreInfinity")?,
            post_infinity: v.i32_of("m_PostInfinity")?,
            rotation_order: v.parse_opt("m_RotationOrder")?.unwrap_or_default(),
        })
    }
}

/// Rotation, position, scale and euler curves share this shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathCurve<T> {
    pub curve: AnimationCurve<T>,
    pub path: String,
}

pub type QuaternionCurve = PathCurve<Quat>;
pub type Vector3Curve = PathCurve<Vec3>;

impl<T: CurveValue> PathCurve<T> {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        Ok(Self { curve: AnimationCurve::read(r)?, path: r.read_aligned_string()? })
    }
}

impl<T: CurveValue> FromTree for PathCurve<T> {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self { curve: v.parse("curve")?, path: v.string_of("path")? })
    }
}

/// Generic float property curve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FloatCurve {
    pub curve: AnimationCurve<f32>,
    pub attribute: String,
    pub path: String,
    pub class_id: i32,
    pub script: PPtr,
    pub flags: i32,
}

impl FloatCurve {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let curve = AnimationCurve::read(r)?;
        let attribute = r.read_aligned_string()?;
        let path = r.read_aligned_string()?;
        let class_id = r.read_i32()?;
        let script = r.read_pptr()?;
        let flags = if r.version().at_least(ver(2022, 2)) { r.read_i32()? } else { 0 };
        Ok(Self { curve, attribute, path, class_id, script, flags })
    }
}

impl FromTree for FloatCurve {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self {
            curve: v.parse("curve")?,
            attribute: v.string_of("attribute")?,
            path: v.string_of("path")?,
            class_id: v.i32_of("classID")?,
            script: v.field("script")?.as_pptr()?,
            flags: v.parse_opt("flags")?.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PPtrKeyframe {
    pub time: f32,
    pub value: PPtr,
}

impl FromTree for PPtrKeyframe {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self { time: v.f32_of("time")?, value: v.field("value")?.as_pptr()? })
    }
}

/// Object-reference curve (sprite swaps and similar).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PPtrCurve {
    pub curve: Vec<PPtrKeyframe>,
    pub attribute: String,
    pub path: String,
    pub class_id: i32,
    pub script: PPtr,
    pub flags: i32,
}

impl PPtrCurve {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let curve = r.read_objects(12, |r| Ok(PPtrKeyframe { time: r.read_f32()?, value: r.read_pptr()? }))?;
        let attribute = r.read_aligned_string()?;
        let path = r.read_aligned_string()?;
        let class_id = r.read_i32()?;
        let script = r.read_pptr()?;
        let flags = if r.version().at_least(ver(2022, 2)) { r.read_i32()? } else { 0 };
        Ok(Self { curve, attribute, path, class_id, script, flags })
    }
}

impl FromTree for PPtrCurve {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self {
            curve: v.array_of("curve")?,
            attribute: v.string_of("attribute")?,
            path: v.string_of("path")?,
            class_id: v.i32_of("classID")?,
            script: v.field("script")?.as_pptr()?,
            flags: v.parse_opt("flags")?.unwrap_or_default(),
        })
    }
}

/// Rotation curve with packed times, quaternions and slopes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompressedAnimationCurve {
    pub path: String,
    pub times: PackedIntVector,
    pub values: PackedQuatVector,
    pub slopes: PackedFloatVector,
    pub pre_infinity: i32,
    pub post_infinity: i32,
}

impl CompressedAnimationCurve {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        Ok(Self {
            path: r.read_aligned_string()?,
            times: PackedIntVector::read(r)?,
            values: PackedQuatVector::read(r)?,
            slopes: PackedFloatVector::read(r)?,
            pre_infinity: r.read_i32()?,
            post_infinity: r.read_i32()?,
        })
    }

    /// Unpack into `(raw time, rotation)` pairs.
    pub fn keys(&self) -> Result<Vec<(i32, Quat)>> {
        let times = self.times.unpack_ints()?;
        let values = self.values.unpack_quats()?;
        Ok(times.into_iter().zip(values).collect())
    }
}

impl FromTree for CompressedAnimationCurve {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self {
            path: v.string_of("m_Path")?,
            times: v.parse("m_Times")?,
            values: v.parse("m_Values")?,
            slopes: v.parse("m_Slopes")?,
            pre_infinity: v.i32_of("m_PreInfinity")?,
            post_infinity: v.i32_of("m_PostInfinity")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationEvent {
    pub time: f32,
    pub function_name: String,
    pub data: String,
    pub object_reference_parameter: PPtr,
    pub float_parameter: f32,
    pub int_parameter: i32,
    pub message_options: i32,
}

impl AnimationEvent {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let version = r.version();
        let mut event = AnimationEvent {
            time: r.read_f32()?,
            function_name: r.read_aligned_string()?,
            data: r.read_aligned_string()?,
            ..Default::default()
        };
        if version.at_least(ver(2, 6)) {
            event.object_reference_parameter = r.read_pptr()?;
            event.float_parameter = r.read_f32()?;
            if version.at_least(ver1(3)) {
                event.int_parameter = r.read_i32()?;
            }
        }
        event.message_options = r.read_i32()?;
        Ok(event)
    }
}

impl FromTree for AnimationEvent {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self {
            time: v.f32_of("time")?,
            function_name: v.string_of("functionName")?,
            data: v.string_of("data")?,
            object_reference_parameter: match v.get("objectReferenceParameter") {
                Some(p) => p.as_pptr()?,
                None => PPtr::null(),
            },
            float_parameter: v.parse_opt("floatParameter")?.unwrap_or_default(),
            int_parameter: v.parse_opt("intParameter")?.unwrap_or_default(),
            message_options: v.i32_of("messageOptions")?,
        })
    }
}
