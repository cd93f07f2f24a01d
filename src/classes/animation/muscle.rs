//! Muscle clip constants: humanoid poses, the packed `Clip` and its bindings.

use super::streamed::StreamedClip;
use crate::classes::class_id::ClassId;
use crate::classes::layout::{FromTree, TreeFields};
use crate::serialized::{ObjectReader, PPtr};
use crate::tree::Value;
use crate::util::{ver, ver1, Quat, Result, Vec3, Vec4};

/// Transform binding attributes.
pub const BIND_TRANSFORM_POSITION: u32 = 1;
pub const BIND_TRANSFORM_ROTATION: u32 = 2;
pub const BIND_TRANSFORM_SCALE: u32 = 3;
pub const BIND_TRANSFORM_EULER: u32 = 4;

/// CRC32 of the first component name of each legacy transform binding.
const CRC_POSITION_X: u32 = 4174552735;
const CRC_QUATERNION_X: u32 = 2211994246;
const CRC_SCALE_X: u32 = 1512518241;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Xform {
    pub t: Vec3,
    pub q: Quat,
    pub s: Vec3,
}

impl Default for Xform {
    fn default() -> Self {
        Self { t: Vec3::ZERO, q: Quat::IDENTITY, s: Vec3::ONE }
    }
}

impl Xform {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        Ok(Self { t: r.read_vec3_or_4()?, q: r.read_quat()?, s: r.read_vec3_or_4()? })
    }
}

impl FromTree for Xform {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self { t: v.parse("t")?, q: v.parse("q")?, s: v.parse("s")? })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandPose {
    pub grab_x: Xform,
    pub dof: Vec<f32>,
    pub override_: f32,
    pub close_open: f32,
    pub in_out: f32,
    pub grab: f32,
}

impl HandPose {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        Ok(Self {
            grab_x: Xform::read(r)?,
            dof: r.read_f32_array()?,
            override_: r.read_f32()?,
            close_open: r.read_f32()?,
            in_out: r.read_f32()?,
            grab: r.read_f32()?,
        })
    }
}

impl FromTree for HandPose {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self {
            grab_x: v.parse("m_GrabX")?,
            dof: v.array_of("m_DoFArray")?,
            override_: v.f32_of("m_Override")?,
            close_open: v.f32_of("m_CloseOpen")?,
            in_out: v.f32_of("m_InOut")?,
            grab: v.f32_of("m_Grab")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HumanGoal {
    pub x: Xform,
    pub weight_t: f32,
    pub weight_r: f32,
    /// Hints exist from 5.0.
    pub hint_t: Vec3,
    pub hint_weight_t: f32,
}

impl HumanGoal {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let mut goal = HumanGoal { x: Xform::read(r)?, weight_t: r.read_f32()?, weight_r: r.read_f32()?, ..Default::default() };
        if r.version().at_least(ver1(5)) {
            goal.hint_t = r.read_vec3_or_4()?;
            goal.hint_weight_t = r.read_f32()?;
        }
        Ok(goal)
    }
}

impl FromTree for HumanGoal {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self {
            x: v.parse("m_X")?,
            weight_t: v.f32_of("m_WeightT")?,
            weight_r: v.f32_of("m_WeightR")?,
            hint_t: v.parse_opt("m_HintT")?.unwrap_or_default(),
            hint_weight_t: v.parse_opt("m_HintWeightT")?.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HumanPose {
    pub root_x: Xform,
    pub look_at_position: Vec3,
    pub look_at_weight: Vec4,
    pub goals: Vec<HumanGoal>,
    pub left_hand: HandPose,
    pub right_hand: HandPose,
    pub dof: Vec<f32>,
    /// Twist degrees of freedom, 5.2 and later.
    pub tdof: Vec<Vec3>,
}

impl HumanPose {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let root_x = Xform::read(r)?;
        let look_at_position = r.read_vec3_or_4()?;
        let look_at_weight = r.read_vec4()?;
        let goals = r.read_objects(48, HumanGoal::read)?;
        let left_hand = HandPose::read(r)?;
        let right_hand = HandPose::read(r)?;
        let dof = r.read_f32_array()?;
        let tdof = if r.version().at_least(ver(5, 2)) { r.read_objects(12, |r| r.read_vec3_or_4())? } else { Vec::new() };
        Ok(Self { root_x, look_at_position, look_at_weight, goals, left_hand, right_hand, dof, tdof })
    }
}

impl FromTree for HumanPose {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self {
            root_x: v.parse("m_RootX")?,
            look_at_position: v.parse("m_LookAtPosition")?,
            look_at_weight: v.parse("m_LookAtWeight")?,
            goals: v.array_of("m_GoalArray")?,
            left_hand: v.parse("m_LeftHandPose")?,
            right_hand: v.parse("m_RightHandPose")?,
            dof: v.array_of("m_DoFArray")?,
            tdof: v.parse_opt::<Vec<Vec3>>("m_TDoFArray")?.unwrap_or_default(),
        })
    }
}

/// Fixed sample-rate curves, `curve_count` floats per frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DenseClip {
    pub frame_count: i32,
    pub curve_count: u32,
    pub sample_rate: f32,
    pub begin_time: f32,
    pub samples: Vec<f32>,
}

impl DenseClip {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        Ok(Self {
            frame_count: r.read_i32()?,
            curve_count: r.read_u32()?,
            sample_rate: r.read_f32()?,
            begin_time: r.read_f32()?,
            samples: r.read_f32_array()?,
        })
    }

    /// Sample values of one frame, if present.
    pub fn frame(&self, index: usize) -> Option<&[f32]> {
        let n = self.curve_count as usize;
        self.samples.get(index * n..(index + 1) * n)
    }
}

impl FromTree for DenseClip {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self {
            frame_count: v.i32_of("m_FrameCount")?,
            curve_count: v.u32_of("m_CurveCount")?,
            sample_rate: v.f32_of("m_SampleRate")?,
            begin_time: v.f32_of("m_BeginTime")?,
            samples: v.array_of("m_SampleArray")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantClip {
    pub data: Vec<f32>,
}

impl FromTree for ConstantClip {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self { data: v.array_of("data")? })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ValueConstant {
    pub id: u32,
    /// Dropped in 5.5.
    pub type_id: u32,
    pub kind: u32,
    pub index: u32,
}

impl ValueConstant {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let id = r.read_u32()?;
        let type_id = if r.version().below(ver(5, 5)) { r.read_u32()? } else { 0 };
        Ok(Self { id, type_id, kind: r.read_u32()?, index: r.read_u32()? })
    }
}

impl FromTree for ValueConstant {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self {
            id: v.u32_of("m_ID")?,
            type_id: v.parse_opt("m_TypeID")?.unwrap_or_default(),
            kind: v.u32_of("m_Type")?,
            index: v.u32_of("m_Index")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueArrayConstant {
    pub values: Vec<ValueConstant>,
}

impl ValueArrayConstant {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        Ok(Self { values: r.read_objects(12, ValueConstant::read)? })
    }

    /// Rebuild generic bindings from a pre-2018.3 value array.
    ///
    /// Transform channels are recognised by the CRC of their first
    /// component name and swallow the following components; anything else
    /// becomes a single Animator attribute.
    pub fn to_generic_bindings(&self) -> AnimationClipBindingConstant {
        let mut bindings = Vec::new();
        let mut i = 0;
        while i < self.values.len() {
            let value = &self.values[i];
            let transform = |attribute, width| {
                (GenericBinding { path: value.id, attribute, type_id: ClassId::Transform, ..Default::default() }, width)
            };
            let (binding, width) = match value.type_id {
                CRC_POSITION_X => transform(BIND_TRANSFORM_POSITION, 3),
                CRC_QUATERNION_X => transform(BIND_TRANSFORM_ROTATION, 4),
                CRC_SCALE_X => transform(BIND_TRANSFORM_SCALE, 3),
                _ => (
                    GenericBinding { path: 0, attribute: value.id, type_id: ClassId::Animator, ..Default::default() },
                    1,
                ),
            };
            bindings.push(binding);
            i += width;
        }
        AnimationClipBindingConstant { generic_bindings: bindings, pptr_curve_mapping: Vec::new() }
    }
}

impl FromTree for ValueArrayConstant {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self { values: v.array_of("m_ValueArray")? })
    }
}

/// Packed muscle curves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clip {
    pub streamed: StreamedClip,
    pub dense: DenseClip,
    /// From 4.3.
    pub constant: Option<ConstantClip>,
    /// Before 2018.3.
    pub binding: Option<ValueArrayConstant>,
}

impl Clip {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let version = r.version();
        let streamed = StreamedClip::read(r)?;
        let dense = DenseClip::read(r)?;
        let constant = if version.at_least(ver(4, 3)) { Some(ConstantClip { data: r.read_f32_array()? }) } else { None };
        let binding = if version.below(ver(2018, 3)) { Some(ValueArrayConstant::read(r)?) } else { None };
        Ok(Self { streamed, dense, constant, binding })
    }
}

impl FromTree for Clip {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self {
            streamed: v.parse("m_StreamedClip")?,
            dense: v.parse("m_DenseClip")?,
            constant: v.parse_opt("m_ConstantClip")?,
            binding: v.parse_opt("m_Binding")?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ValueDelta {
    pub start: f32,
    pub stop: f32,
}

impl FromTree for ValueDelta {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self { start: v.f32_of("m_Start")?, stop: v.f32_of("m_Stop")? })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipMuscleConstant {
    pub delta_pose: HumanPose,
    pub start_x: Xform,
    pub stop_x: Option<Xform>,
    pub left_foot_start_x: Xform,
    pub right_foot_start_x: Xform,
    pub motion_start_x: Option<Xform>,
    pub motion_stop_x: Option<Xform>,
    pub average_speed: Vec3,
    pub clip: Clip,
    pub start_time: f32,
    pub stop_time: f32,
    pub orientation_offset_y: f32,
    pub level: f32,
    pub cycle_offset: f32,
    pub average_angular_speed: f32,
    pub index_array: Vec<i32>,
    pub value_array_delta: Vec<ValueDelta>,
    pub value_array_reference_pose: Vec<f32>,
    pub mirror: bool,
    pub loop_time: bool,
    pub loop_blend: bool,
    pub loop_blend_orientation: bool,
    pub loop_blend_position_y: bool,
    pub loop_blend_position_xz: bool,
    pub start_at_origin: bool,
    pub keep_original_orientation: bool,
    pub keep_original_position_y: bool,
    pub keep_original_position_xz: bool,
    pub height_from_feet: bool,
}

impl ClipMuscleConstant {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let version = r.version();
        let mut c = ClipMuscleConstant { delta_pose: HumanPose::read(r)?, start_x: Xform::read(r)?, ..Default::default() };
        if version.at_least(ver(5, 5)) {
            c.stop_x = Some(Xform::read(r)?);
        }
        c.left_foot_start_x = Xform::read(r)?;
        c.right_foot_start_x = Xform::read(r)?;
        if version.below(ver1(5)) {
            c.motion_start_x = Some(Xform::read(r)?);
            c.motion_stop_x = Some(Xform::read(r)?);
        }
        c.average_speed = r.read_vec3_or_4()?;
        c.clip = Clip::read(r)?;
        c.start_time = r.read_f32()?;
        c.stop_time = r.read_f32()?;
        c.orientation_offset_y = r.read_f32()?;
        c.level = r.read_f32()?;
        c.cycle_offset = r.read_f32()?;
        c.average_angular_speed = r.read_f32()?;
        c.index_array = r.read_i32_array()?;
        if version.below(ver(4, 3)) {
            let _additional_curve_index = r.read_i32_array()?;
        }
        c.value_array_delta = r.read_array(8, |r| Ok(ValueDelta { start: r.read_f32()?, stop: r.read_f32()? }))?;
        if version.at_least(ver(5, 3)) {
            c.value_array_reference_pose = r.read_f32_array()?;
        }
        c.mirror = r.read_bool()?;
        if version.at_least(ver(4, 3)) {
            c.loop_time = r.read_bool()?;
        }
        c.loop_blend = r.read_bool()?;
        c.loop_blend_orientation = r.read_bool()?;
        c.loop_blend_position_y = r.read_bool()?;
        c.loop_blend_position_xz = r.read_bool()?;
        if version.at_least(ver(5, 5)) {
            c.start_at_origin = r.read_bool()?;
        }
        c.keep_original_orientation = r.read_bool()?;
        c.keep_original_position_y = r.read_bool()?;
        c.keep_original_position_xz = r.read_bool()?;
        c.height_from_feet = r.read_bool()?;
        r.align(4)?;
        Ok(c)
    }
}

impl FromTree for ClipMuscleConstant {
    fn from_tree(v: &Value) -> Result<Self> {
        let flag = |name: &str| -> Result<bool> { Ok(v.get(name).map(Value::as_bool).transpose()?.unwrap_or(false)) };
        Ok(Self {
            delta_pose: v.parse("m_DeltaPose")?,
            start_x: v.parse("m_StartX")?,
            stop_x: v.parse_opt("m_StopX")?,
            left_foot_start_x: v.parse("m_LeftFootStartX")?,
            right_foot_start_x: v.parse("m_RightFootStartX")?,
            motion_start_x: v.parse_opt("m_MotionStartX")?,
            motion_stop_x: v.parse_opt("m_MotionStopX")?,
            average_speed: v.parse("m_AverageSpeed")?,
            // OffsetPtr wraps the clip in a `data` record.
            clip: v.field("m_Clip")?.parse("data")?,
            start_time: v.f32_of("m_StartTime")?,
            stop_time: v.f32_of("m_StopTime")?,
            orientation_offset_y: v.f32_of("m_OrientationOffsetY")?,
            level: v.f32_of("m_Level")?,
            cycle_offset: v.f32_of("m_CycleOffset")?,
            average_angular_speed: v.f32_of("m_AverageAngularSpeed")?,
            index_array: v.array_of("m_IndexArray")?,
            value_array_delta: v.array_of("m_ValueArrayDelta")?,
            value_array_reference_pose: v.parse_opt("m_ValueArrayReferencePose")?.unwrap_or_default(),
            mirror: flag("m_Mirror")?,
            loop_time: flag("m_LoopTime")?,
            loop_blend: flag("m_LoopBlend")?,
            loop_blend_orientation: flag("m_LoopBlendOrientation")?,
            loop_blend_position_y: flag("m_LoopBlendPositionY")?,
            loop_blend_position_xz: flag("m_LoopBlendPositionXZ")?,
            start_at_origin: flag("m_StartAtOrigin")?,
            keep_original_orientation: flag("m_KeepOriginalOrientation")?,
            keep_original_position_y: flag("m_KeepOriginalPositionY")?,
            keep_original_position_xz: flag("m_KeepOriginalPositionXZ")?,
            height_from_feet: flag("m_HeightFromFeet")?,
        })
    }
}

/// Maps one or more curves of a muscle clip to an animated property.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericBinding {
    /// CRC of the bound transform path.
    pub path: u32,
    pub attribute: u32,
    pub script: PPtr,
    pub type_id: ClassId,
    pub custom_type: u8,
    pub is_pptr_curve: u8,
    pub is_int_curve: u8,
    pub is_serialize_reference_curve: u8,
}

impl GenericBinding {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let version = r.version();
        let mut b = GenericBinding { path: r.read_u32()?, attribute: r.read_u32()?, script: r.read_pptr()?, ..Default::default() };
        b.type_id = ClassId(if version.at_least(ver(5, 6)) { r.read_i32()? } else { r.read_u16()? as i32 });
        b.custom_type = r.read_u8()?;
        b.is_pptr_curve = r.read_u8()?;
        if version.at_least(ver(2022, 1)) {
            b.is_int_curve = r.read_u8()?;
        }
        if version.at_least(ver(2022, 2)) {
            b.is_serialize_reference_curve = r.read_u8()?;
        }
        r.align(4)?;
        Ok(b)
    }

    /// Number of clip curves this binding consumes.
    pub fn curve_width(&self) -> usize {
        if self.type_id != ClassId::Transform {
            return 1;
        }
        match self.attribute {
            BIND_TRANSFORM_POSITION | BIND_TRANSFORM_SCALE | BIND_TRANSFORM_EULER => 3,
            BIND_TRANSFORM_ROTATION => 4,
            _ => 1,
        }
    }
}

impl FromTree for GenericBinding {
    fn from_tree(v: &Value) -> Result<Self> {
        let byte = |name: &str| -> Result<u8> { Ok(v.parse_opt::<u32>(name)?.unwrap_or(0) as u8) };
        Ok(Self {
            path: v.u32_of("path")?,
            attribute: v.u32_of("attribute")?,
            script: v.field("script")?.as_pptr()?,
            type_id: ClassId(v.i32_of("typeID")?),
            custom_type: byte("customType")?,
            is_pptr_curve: byte("isPPtrCurve")?,
            is_int_curve: byte("isIntCurve")?,
            is_serialize_reference_curve: byte("isSerializeReferenceCurve")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationClipBindingConstant {
    pub generic_bindings: Vec<GenericBinding>,
    pub pptr_curve_mapping: Vec<PPtr>,
}

impl AnimationClipBindingConstant {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        Ok(Self { generic_bindings: r.read_objects(16, GenericBinding::read)?, pptr_curve_mapping: r.read_pptr_array()? })
    }

    /// Binding that owns clip curve `index`.
    pub fn find_binding(&self, index: usize) -> Option<&GenericBinding> {
        let mut curves = 0;
        self.generic_bindings.iter().find(|b| {
            curves += b.curve_width();
            curves > index
        })
    }
}

impl FromTree for AnimationClipBindingConstant {
    fn from_tree(v: &Value) -> Result<Self> {
        let mapping = v.field("pptrCurveMapping")?.as_array()?.iter().map(Value::as_pptr).collect::<Result<_>>()?;
        Ok(Self { generic_bindings: v.array_of("genericBindings")?, pptr_curve_mapping: mapping })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialized::testing::{member, Payload};

    fn binding(type_id: ClassId, attribute: u32) -> GenericBinding {
        GenericBinding { type_id, attribute, ..Default::default() }
    }

    #[test]
    fn test_find_binding_widths() {
        let bindings = AnimationClipBindingConstant {
            generic_bindings: vec![
                binding(ClassId::Transform, BIND_TRANSFORM_POSITION),
                binding(ClassId::Transform, BIND_TRANSFORM_ROTATION),
                binding(ClassId::Animator, 77),
                binding(ClassId::Transform, BIND_TRANSFORM_EULER),
            ],
            pptr_curve_mapping: Vec::new(),
        };
        // curves 0..3 position, 3..7 rotation, 7 animator, 8..11 euler
        assert_eq!(bindings.find_binding(0).map(|b| b.attribute), Some(1));
        assert_eq!(bindings.find_binding(2).map(|b| b.attribute), Some(1));
        assert_eq!(bindings.find_binding(3).map(|b| b.attribute), Some(2));
        assert_eq!(bindings.find_binding(6).map(|b| b.attribute), Some(2));
        assert_eq!(bindings.find_binding(7).map(|b| b.attribute), Some(77));
        assert_eq!(bindings.find_binding(10).map(|b| b.attribute), Some(4));
        assert!(bindings.find_binding(11).is_none());
    }

    #[test]
    fn test_non_transform_attribute_is_one_curve() {
        assert_eq!(binding(ClassId::Animator, BIND_TRANSFORM_ROTATION).curve_width(), 1);
        assert_eq!(binding(ClassId::Transform, 9).curve_width(), 1);
    }

    #[test]
    fn test_value_array_to_bindings() {
        let value = |id, type_id| ValueConstant { id, type_id, kind: 0, index: 0 };
        let values = ValueArrayConstant {
            values: vec![
                value(11, CRC_POSITION_X),
                value(11, 0),
                value(11, 0),
                value(12, CRC_QUATERNION_X),
                value(12, 0),
                value(12, 0),
                value(12, 0),
                value(900, 5),
                value(13, CRC_SCALE_X),
                value(13, 0),
                value(13, 0),
            ],
        };
        let out = values.to_generic_bindings();
        let summary: Vec<_> = out.generic_bindings.iter().map(|b| (b.path, b.attribute, b.type_id)).collect();
        assert_eq!(
            summary,
            [
                (11, BIND_TRANSFORM_POSITION, ClassId::Transform),
                (12, BIND_TRANSFORM_ROTATION, ClassId::Transform),
                (0, 900, ClassId::Animator),
                (13, BIND_TRANSFORM_SCALE, ClassId::Transform),
            ]
        );
        assert_eq!(out.find_binding(7).map(|b| b.attribute), Some(900));
    }

    #[test]
    fn test_dense_frame_slices() {
        let dense = DenseClip { frame_count: 2, curve_count: 3, samples: (0..6).map(|x| x as f32).collect(), ..Default::default() };
        assert_eq!(dense.frame(1), Some(&[3.0, 4.0, 5.0][..]));
        assert!(dense.frame(2).is_none());
    }

    /// Empty streamed clip and a one-sample dense clip, then the gated tail.
    fn clip_bytes(constant: bool, value_array: Option<bool>) -> Vec<u8> {
        let mut p = Payload::new();
        p.i32(0).u32(2);
        p.i32(3).u32(1).f32(30.0).f32(0.5).i32(1).f32(1.5);
        if constant {
            p.i32(1).f32(2.5);
        }
        if let Some(with_type) = value_array {
            p.i32(1).u32(7);
            if with_type {
                p.u32(CRC_POSITION_X);
            }
            p.u32(1).u32(0);
        }
        p.finish()
    }

    #[test]
    fn test_clip_tail_brackets() {
        let cases = [
            ("4.2.2f1", clip_bytes(false, Some(true)), false, Some(CRC_POSITION_X)),
            ("4.3.0f4", clip_bytes(true, Some(true)), true, Some(CRC_POSITION_X)),
            ("2018.2.21f1", clip_bytes(true, Some(false)), true, Some(0)),
            ("2018.3.0f2", clip_bytes(true, None), true, None),
        ];
        for (version, bytes, has_constant, binding_type) in cases {
            let file = member(version, 74, &bytes);
            let mut r = file.object_reader(&file.objects[0]).unwrap();
            let clip = Clip::read(&mut r).unwrap();
            assert_eq!(r.position(), bytes.len(), "{version}");
            assert_eq!(clip.streamed.curve_count, 2);
            assert_eq!(clip.dense.frame_count, 3);
            assert_eq!(clip.dense.samples, [1.5]);
            assert_eq!(clip.constant.is_some(), has_constant, "{version}");
            if let Some(constant) = &clip.constant {
                assert_eq!(constant.data, [2.5]);
            }
            let values = clip.binding.as_ref().map(|b| b.values.as_slice());
            match (values, binding_type) {
                (Some([value]), Some(type_id)) => {
                    assert_eq!((value.id, value.type_id, value.kind), (7, type_id, 1), "{version}");
                }
                (None, None) => {}
                other => panic!("{version}: unexpected binding {other:?}"),
            }
        }
    }
}
