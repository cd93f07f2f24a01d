//! Variable-density keyframes packed as raw words (`StreamedClip`).

use crate::classes::layout::{FromTree, TreeFields};
use crate::serialized::ObjectReader;
use crate::stream::{Endian, EndianReader};
use crate::tree::Value;
use crate::util::{ver1, ver3, Result, UnityVersion};

/// Minimum time step used by the slope continuity formula.
const MIN_DELTA_TIME: f32 = 0.0001;

/// The curve-count word splits into two `u16` counts in these releases.
fn has_discrete_curve_count(version: &UnityVersion) -> bool {
    (version.at_least(ver3(2022, 3, 19)) && version.below(ver1(2023))) || version.at_least(ver3(2023, 2, 8))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamedClip {
    pub data: Vec<u32>,
    pub curve_count: u32,
    pub discrete_curve_count: u32,
}

/// One curve's polynomial segment starting at a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamedCurveKey {
    pub index: i32,
    pub coeff: [f32; 4],
    pub value: f32,
    pub out_slope: f32,
    pub in_slope: f32,
}

impl StreamedCurveKey {
    fn new(index: i32, coeff: [f32; 4]) -> Self {
        Self { index, coeff, value: coeff[3], out_slope: coeff[2], in_slope: 0.0 }
    }

    /// In-slope of `next`, reached from this key after `dx` seconds.
    ///
    /// A segment whose first three coefficients are all zero is stepped and
    /// yields positive infinity.
    pub fn next_in_slope(&self, dx: f32, next: &StreamedCurveKey) -> f32 {
        if self.coeff[0] == 0.0 && self.coeff[1] == 0.0 && self.coeff[2] == 0.0 {
            return f32::INFINITY;
        }
        let dx = dx.max(MIN_DELTA_TIME);
        let dy = next.value - self.value;
        let length = 1.0 / (dx * dx);
        let d1 = self.out_slope * dx;
        let d2 = dy + dy + dy - d1 - d1 - self.coeff[1] / length;
        d2 / dx
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamedFrame {
    pub time: f32,
    pub keys: Vec<StreamedCurveKey>,
}

impl StreamedClip {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let data = r.read_u32_array()?;
        let (curve_count, discrete_curve_count) = if has_discrete_curve_count(r.version()) {
            (r.read_u16()? as u32, r.read_u16()? as u32)
        } else {
            (r.read_u32()?, 0)
        };
        Ok(Self { data, curve_count, discrete_curve_count })
    }

    /// Parse the word buffer into frames and fill in every key's in-slope.
    ///
    /// The first two frames and the last one are sentinels and keep a zero
    /// in-slope.
    pub fn frames(&self) -> Result<Vec<StreamedFrame>> {
        let bytes: Vec<u8> = self.data.iter().flat_map(|w| w.to_le_bytes()).collect();
        let mut r = EndianReader::new(&bytes, Endian::Little);
        let mut frames = Vec::new();
        while r.remaining() > 0 {
            let time = r.read_f32()?;
            let count = r.read_count(20)?;
            let keys = r.read_n(count, |r| {
                let index = r.read_i32()?;
                let coeff = [r.read_f32()?, r.read_f32()?, r.read_f32()?, r.read_f32()?];
                Ok(StreamedCurveKey::new(index, coeff))
            })?;
            frames.push(StreamedFrame { time, keys });
        }

        for f in 2..frames.len().saturating_sub(1) {
            let (before, rest) = frames.split_at_mut(f);
            let frame = &mut rest[0];
            for key in &mut frame.keys {
                let previous = before
                    .iter()
                    .rev()
                    .find_map(|p| p.keys.iter().find(|k| k.index == key.index).map(|k| (p.time, *k)));
                if let Some((time, prev)) = previous {
                    key.in_slope = prev.next_in_slope(frame.time - time, key);
                }
            }
        }
        Ok(frames)
    }
}

impl FromTree for StreamedClip {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self {
            data: v.array_of("data")?,
            curve_count: v.u32_of("curveCount")?,
            discrete_curve_count: v.parse_opt("discreteCurveCount")?.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialized::testing::{member, Payload};
    use approx::assert_abs_diff_eq;

    fn frame_words(time: f32, keys: &[(i32, [f32; 4])]) -> Vec<u32> {
        let mut words = vec![time.to_bits(), keys.len() as u32];
        for (index, coeff) in keys {
            words.push(*index as u32);
            words.extend(coeff.iter().map(|c| c.to_bits()));
        }
        words
    }

    #[test]
    fn test_curve_count_split() {
        let v = |s: &str| s.parse::<UnityVersion>().unwrap();
        assert!(!has_discrete_curve_count(&v("2022.3.18f1")));
        assert!(has_discrete_curve_count(&v("2022.3.19f1")));
        assert!(!has_discrete_curve_count(&v("2023.1.5f1")));
        assert!(!has_discrete_curve_count(&v("2023.2.7f1")));
        assert!(has_discrete_curve_count(&v("2023.2.8f1")));
        assert!(has_discrete_curve_count(&v("6000.0.0f1")));
        assert!(!has_discrete_curve_count(&v("2021.3.30f1")));
    }

    #[test]
    fn test_curve_count_word_around_2022_3_19() {
        // the same word is one u32 count or two u16 counts
        let bytes = Payload::new().i32(2).u32(0xDEAD).u32(0xBEEF).u16(5).u16(2).finish();
        let cases = [
            ("2022.3.18f1", 0x0002_0005, 0),
            ("2022.3.19f1", 5, 2),
            ("2023.2.7f1", 0x0002_0005, 0),
            ("2023.2.8f1", 5, 2),
        ];
        for (version, curves, discrete) in cases {
            let file = member(version, 74, &bytes);
            let mut r = file.object_reader(&file.objects[0]).unwrap();
            let clip = StreamedClip::read(&mut r).unwrap();
            assert_eq!(clip.data, [0xDEAD, 0xBEEF]);
            assert_eq!((clip.curve_count, clip.discrete_curve_count), (curves, discrete), "{version}");
            assert_eq!(r.position(), bytes.len(), "{version}");
        }
    }

    #[test]
    fn test_frames_and_slopes() {
        let mut data = Vec::new();
        data.extend(frame_words(f32::NEG_INFINITY, &[(0, [0.0, 0.0, 0.0, 1.0])]));
        data.extend(frame_words(0.0, &[(0, [1.0, 2.0, 0.5, 1.0]), (1, [0.0, 0.0, 0.0, 5.0])]));
        data.extend(frame_words(0.5, &[(0, [0.0, 0.0, 0.25, 2.0]), (1, [0.0, 0.0, 0.0, 6.0])]));
        data.extend(frame_words(f32::INFINITY, &[(0, [0.0, 0.0, 0.0, 2.0])]));
        let clip = StreamedClip { data, curve_count: 2, discrete_curve_count: 0 };

        let frames = clip.frames().unwrap();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[1].keys.len(), 2);
        assert_eq!(frames[2].keys[0].value, 2.0);
        assert_eq!(frames[2].keys[0].out_slope, 0.25);

        // dx = 0.5, dy = 1, d1 = 0.25, d2 = 3 - 2 * 0.25 - 2 / 4 = 2
        assert_abs_diff_eq!(frames[2].keys[0].in_slope, 4.0, epsilon = 1e-5);
        // stepped segment
        assert_eq!(frames[2].keys[1].in_slope, f32::INFINITY);
        // sentinels are untouched
        assert_eq!(frames[1].keys[0].in_slope, 0.0);
        assert_eq!(frames[3].keys[0].in_slope, 0.0);
    }

    #[test]
    fn test_slope_scans_back_past_gaps() {
        let mut data = Vec::new();
        data.extend(frame_words(-1.0, &[]));
        data.extend(frame_words(0.0, &[(3, [0.0, 0.0, 1.0, 0.0])]));
        data.extend(frame_words(1.0, &[(4, [0.0, 0.0, 0.0, 0.0])]));
        data.extend(frame_words(2.0, &[(3, [0.0, 0.0, 0.0, 2.0])]));
        data.extend(frame_words(9.0, &[]));
        let frames = StreamedClip { data, ..Default::default() }.frames().unwrap();
        // from t=0 to t=2: dy = 2, d1 = 2, d2 = 6 - 4 = 2, slope = 1
        assert_abs_diff_eq!(frames[3].keys[0].in_slope, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_truncated_words_error() {
        let mut data = frame_words(0.0, &[(0, [0.0; 4])]);
        data.pop();
        assert!(StreamedClip { data, ..Default::default() }.frames().is_err());
    }
}
