//! AnimationClip decoder.
//!
//! Legacy clips keep explicit keyframe curves. From 4.0 a clip may also
//! carry a muscle clip, whose [`Clip`] packs curves as a [`StreamedClip`], a
//! [`DenseClip`] and a [`ConstantClip`], mapped to properties through an
//! [`AnimationClipBindingConstant`].

mod curves;
mod muscle;
mod streamed;

pub use curves::{
    AnimationCurve, AnimationEvent, CompressedAnimationCurve, CurveValue, FloatCurve, Keyframe, PPtrCurve,
    PPtrKeyframe, PathCurve, QuaternionCurve, Vector3Curve,
};
pub use muscle::{
    AnimationClipBindingConstant, Clip, ClipMuscleConstant, ConstantClip, DenseClip, GenericBinding, HandPose,
    HumanGoal, HumanPose, ValueArrayConstant, ValueConstant, ValueDelta, Xform, BIND_TRANSFORM_EULER,
    BIND_TRANSFORM_POSITION, BIND_TRANSFORM_ROTATION, BIND_TRANSFORM_SCALE,
};
pub use streamed::{StreamedClip, StreamedCurveKey, StreamedFrame};

use super::base::read_named;
use super::layout::{run_steps, FieldStep, FromTree, TreeFields};
use crate::serialized::ObjectReader;
use crate::tree::Value;
use crate::util::{ver, ver1, Aabb, Result, VersionGate};

/// `m_AnimationType` value of legacy clips.
const ANIMATION_TYPE_LEGACY: i32 = 1;

#[derive(Debug, Clone, Default)]
pub struct AnimationClip {
    pub name: String,
    pub legacy: bool,
    pub compressed: bool,
    pub use_high_quality_curve: bool,
    pub rotation_curves: Vec<QuaternionCurve>,
    pub compressed_rotation_curves: Vec<CompressedAnimationCurve>,
    pub euler_curves: Vec<Vector3Curve>,
    pub position_curves: Vec<Vector3Curve>,
    pub scale_curves: Vec<Vector3Curve>,
    pub float_curves: Vec<FloatCurve>,
    pub pptr_curves: Vec<PPtrCurve>,
    pub sample_rate: f32,
    pub wrap_mode: i32,
    pub bounds: Aabb,
    pub muscle_clip_size: u32,
    pub muscle_clip: Option<ClipMuscleConstant>,
    pub clip_binding_constant: Option<AnimationClipBindingConstant>,
    pub has_generic_root_transform: bool,
    pub has_motion_float_curves: bool,
    pub events: Vec<AnimationEvent>,
}

pub(crate) const CLIP_LAYOUT: &[FieldStep<AnimationClip>] = &[
    FieldStep::new("m_Legacy", VersionGate::Since(ver1(5)), |r, c| {
        c.legacy = r.read_bool()?;
        Ok(())
    }),
    FieldStep::new("m_AnimationType", VersionGate::Between(ver1(4), ver1(5)), |r, c| {
        c.legacy = r.read_i32()? == ANIMATION_TYPE_LEGACY;
        Ok(())
    }),
    FieldStep::new("m_Legacy (implied)", VersionGate::Before(ver1(4)), |_, c| {
        c.legacy = true;
        Ok(())
    }),
    FieldStep::new("m_Compressed", VersionGate::Since(ver(2, 6)), |r, c| {
        c.compressed = r.read_bool()?;
        Ok(())
    }),
    FieldStep::new("m_UseHighQualityCurve", VersionGate::Since(ver(4, 3)), |r, c| {
        c.use_high_quality_curve = r.read_bool()?;
        Ok(())
    }),
    FieldStep::new("m_RotationCurves", VersionGate::Always, |r, c| {
        r.align(4)?;
        c.rotation_curves = r.read_objects(24, PathCurve::read)?;
        Ok(())
    }),
    FieldStep::new("m_CompressedRotationCurves", VersionGate::Since(ver(2, 6)), |r, c| {
        c.compressed_rotation_curves = r.read_objects(60, CompressedAnimationCurve::read)?;
        Ok(())
    }),
    FieldStep::new("m_EulerCurves", VersionGate::Since(ver(5, 3)), |r, c| {
        c.euler_curves = r.read_objects(24, PathCurve::read)?;
        Ok(())
    }),
    FieldStep::new("m_PositionCurves", VersionGate::Always, |r, c| {
        c.position_curves = r.read_objects(16, PathCurve::read)?;
        Ok(())
    }),
    FieldStep::new("m_ScaleCurves", VersionGate::Always, |r, c| {
        c.scale_curves = r.read_objects(16, PathCurve::read)?;
        Ok(())
    }),
    FieldStep::new("m_FloatCurves", VersionGate::Always, |r, c| {
        c.float_curves = r.read_objects(32, FloatCurve::read)?;
        Ok(())
    }),
    FieldStep::new("m_PPtrCurves", VersionGate::Since(ver(4, 3)), |r, c| {
        c.pptr_curves = r.read_objects(24, PPtrCurve::read)?;
        Ok(())
    }),
    FieldStep::new("m_SampleRate", VersionGate::Always, |r, c| {
        c.sample_rate = r.read_f32()?;
        Ok(())
    }),
    FieldStep::new("m_WrapMode", VersionGate::Since(ver(2, 6)), |r, c| {
        c.wrap_mode = r.read_i32()?;
        Ok(())
    }),
    FieldStep::new("m_Bounds", VersionGate::Since(ver(3, 4)), |r, c| {
        c.bounds = r.read_aabb()?;
        Ok(())
    }),
    FieldStep::new("m_MuscleClip", VersionGate::Since(ver1(4)), |r, c| {
        c.muscle_clip_size = r.read_u32()?;
        c.muscle_clip = Some(ClipMuscleConstant::read(r)?);
        Ok(())
    }),
    FieldStep::new("m_ClipBindingConstant", VersionGate::Since(ver(4, 3)), |r, c| {
        c.clip_binding_constant = Some(AnimationClipBindingConstant::read(r)?);
        Ok(())
    }),
    FieldStep::new("m_HasGenericRootTransform", VersionGate::Since(ver(2018, 3)), |r, c| {
        c.has_generic_root_transform = r.read_bool()?;
        c.has_motion_float_curves = r.read_bool()?;
        r.align(4)?;
        Ok(())
    }),
    FieldStep::new("m_Events", VersionGate::Always, |r, c| {
        c.events = r.read_objects(16, AnimationEvent::read)?;
        Ok(())
    }),
    FieldStep::new("align", VersionGate::Since(ver1(2017)), |r, _| r.align(4)),
];

impl AnimationClip {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let mut clip = AnimationClip { name: read_named(r)?, ..Default::default() };
        run_steps(CLIP_LAYOUT, r, &mut clip)?;
        Ok(clip)
    }

    /// Bindings of the muscle clip curves.
    ///
    /// Pre-2018.3 clips only store a value array inside the clip; it is
    /// converted on the fly.
    pub fn bindings(&self) -> Option<AnimationClipBindingConstant> {
        let from_values = || self.muscle_clip.as_ref()?.clip.binding.as_ref().map(ValueArrayConstant::to_generic_bindings);
        match &self.clip_binding_constant {
            Some(b) if !b.generic_bindings.is_empty() => Some(b.clone()),
            other => from_values().or_else(|| other.clone()),
        }
    }
}

impl FromTree for AnimationClip {
    fn from_tree(v: &Value) -> Result<Self> {
        let legacy = match (v.get("m_Legacy"), v.get("m_AnimationType")) {
            (Some(l), _) => l.as_bool()?,
            (None, Some(t)) => t.as_i32()? == ANIMATION_TYPE_LEGACY,
            (None, None) => true,
        };
        let flag = |name: &str| -> Result<bool> { Ok(v.get(name).map(Value::as_bool).transpose()?.unwrap_or(false)) };
        Ok(Self {
            name: v.string_of("m_Name")?,
            legacy,
            compressed: flag("m_Compressed")?,
            use_high_quality_curve: flag("m_UseHighQualityCurve")?,
            rotation_curves: v.array_of("m_RotationCurves")?,
            compressed_rotation_curves: v.parse_opt("m_CompressedRotationCurves")?.unwrap_or_default(),
            euler_curves: v.parse_opt("m_EulerCurves")?.unwrap_or_default(),
            position_curves: v.array_of("m_PositionCurves")?,
            scale_curves: v.array_of("m_ScaleCurves")?,
            float_curves: v.array_of("m_FloatCurves")?,
            pptr_curves: v.parse_opt("m_PPtrCurves")?.unwrap_or_default(),
            sample_rate: v.f32_of("m_SampleRate")?,
            wrap_mode: v.parse_opt("m_WrapMode")?.unwrap_or_default(),
            bounds: v.parse_opt("m_Bounds")?.unwrap_or_default(),
            muscle_clip_size: v.parse_opt("m_MuscleClipSize")?.unwrap_or_default(),
            muscle_clip: v.parse_opt("m_MuscleClip")?,
            clip_binding_constant: v.parse_opt("m_ClipBindingConstant")?,
            has_generic_root_transform: flag("m_HasGenericRootTransform")?,
            has_motion_float_curves: flag("m_HasMotionFloatCurves")?,
            events: v.array_of("m_Events")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::layout::active_steps;
    use crate::util::UnityVersion;
    use indexmap::IndexMap;

    fn v(s: &str) -> UnityVersion {
        s.parse().unwrap()
    }

    #[test]
    fn test_layout_brackets() {
        let legacy = active_steps(CLIP_LAYOUT, &v("3.5.7f6"));
        assert!(legacy.contains(&"m_Legacy (implied)"));
        assert!(!legacy.contains(&"m_MuscleClip"));
        assert!(!legacy.contains(&"m_PPtrCurves"));

        let v42 = active_steps(CLIP_LAYOUT, &v("4.2.2f1"));
        assert!(v42.contains(&"m_AnimationType"));
        assert!(v42.contains(&"m_MuscleClip"));
        assert!(!v42.contains(&"m_ClipBindingConstant"));
        assert!(!v42.contains(&"m_UseHighQualityCurve"));

        let v43 = active_steps(CLIP_LAYOUT, &v("4.3.0f4"));
        assert!(v43.contains(&"m_ClipBindingConstant"));
        assert!(v43.contains(&"m_PPtrCurves"));

        let modern = active_steps(CLIP_LAYOUT, &v("2019.4.31f1"));
        assert!(modern.contains(&"m_Legacy"));
        assert!(!modern.contains(&"m_AnimationType"));
        assert!(modern.contains(&"m_EulerCurves"));
        assert!(modern.contains(&"m_HasGenericRootTransform"));
        assert_eq!(modern.last(), Some(&"align"));
    }

    fn rec(fields: Vec<(&str, Value)>) -> Value {
        Value::Record(fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect::<IndexMap<_, _>>())
    }

    fn keyframe(time: f32, value: f32) -> Value {
        rec(vec![
            ("time", Value::Float(time)),
            ("value", Value::Float(value)),
            ("inSlope", Value::Float(0.0)),
            ("outSlope", Value::Float(1.0)),
        ])
    }

    #[test]
    fn test_from_tree_legacy_clip() {
        let pptr = rec(vec![("m_FileID", Value::Int(0)), ("m_PathID", Value::Int(0))]);
        let curve = rec(vec![
            ("m_Curve", Value::Array(vec![keyframe(0.0, 1.0), keyframe(1.0, 2.0)])),
            ("m_PreInfinity", Value::Int(2)),
            ("m_PostInfinity", Value::Int(2)),
        ]);
        let float_curve = rec(vec![
            ("curve", curve),
            ("attribute", Value::String("m_Alpha".into())),
            ("path", Value::String("Body".into())),
            ("classID", Value::Int(23)),
            ("script", pptr),
        ]);
        let tree = rec(vec![
            ("m_Name", Value::String("Fade".into())),
            ("m_AnimationType", Value::Int(ANIMATION_TYPE_LEGACY as i64)),
            ("m_RotationCurves", Value::Array(vec![])),
            ("m_PositionCurves", Value::Array(vec![])),
            ("m_ScaleCurves", Value::Array(vec![])),
            ("m_FloatCurves", Value::Array(vec![float_curve])),
            ("m_SampleRate", Value::Float(30.0)),
            ("m_Events", Value::Array(vec![])),
        ]);
        let clip = AnimationClip::from_tree(&tree).unwrap();
        assert_eq!(clip.name, "Fade");
        assert!(clip.legacy);
        assert_eq!(clip.sample_rate, 30.0);
        let keys = &clip.float_curves[0].curve.keys;
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[1].value, 2.0);
        assert_eq!(keys[1].out_slope, 1.0);
        assert_eq!(keys[1].weighted_mode, 0);
        assert!(clip.muscle_clip.is_none());
        assert!(clip.bindings().is_none());
    }

    #[test]
    fn test_bindings_fall_back_to_value_array() {
        let values = ValueArrayConstant { values: vec![ValueConstant { id: 5, type_id: 1, kind: 0, index: 0 }] };
        let clip = AnimationClip {
            muscle_clip: Some(ClipMuscleConstant {
                clip: Clip { binding: Some(values), ..Default::default() },
                ..Default::default()
            }),
            clip_binding_constant: Some(AnimationClipBindingConstant::default()),
            ..Default::default()
        };
        let bindings = clip.bindings().unwrap();
        assert_eq!(bindings.generic_bindings.len(), 1);
        assert_eq!(bindings.generic_bindings[0].attribute, 5);
    }
}
