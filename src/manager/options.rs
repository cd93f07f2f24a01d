//! Load configuration.

use std::collections::HashSet;

use crate::bundle::BundleOptions;
use crate::classes::ClassId;
use crate::core::CompressionChoice;
use crate::tree::TypelessMode;
use crate::util::{Error, Result, UnityVersion};

/// Classes every filtered load keeps, since relations and bundle
/// bookkeeping depend on them.
const ALWAYS_LOADED: [ClassId; 4] =
    [ClassId::AssetBundle, ClassId::ResourceManager, ClassId::GameObject, ClassId::Transform];

/// Options for a [`LoadSession`](super::LoadSession).
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Replaces the embedded engine version of every member. Required for
    /// members whose version was stripped.
    pub version_override: Option<UnityVersion>,
    pub block_compression: CompressionChoice,
    pub block_info_compression: CompressionChoice,
    /// Decode through the member's schema trees when present.
    pub use_type_tree: bool,
    /// Classes to decode; `None` decodes everything.
    pub class_filter: Option<HashSet<ClassId>>,
    /// Map input files instead of reading them into memory.
    pub use_mmap: bool,
    /// Worker count of the decode pass; `None` uses the global pool.
    pub threads: Option<usize>,
    pub typeless_data: TypelessMode,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            version_override: None,
            block_compression: CompressionChoice::Auto,
            block_info_compression: CompressionChoice::Auto,
            use_type_tree: true,
            class_filter: None,
            use_mmap: cfg!(feature = "mmap"),
            threads: None,
            typeless_data: TypelessMode::Skip,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the version override. Incomplete versions (no build type) are
    /// rejected.
    pub fn with_version(mut self, version: UnityVersion) -> Result<Self> {
        if version.is_stripped() {
            return Err(Error::InvalidVersion(format!(
                "\"{version}\" is missing its build type, expected something like 2017.4.39f1"
            )));
        }
        self.version_override = Some(version);
        Ok(self)
    }

    /// Same as [`with_version`](Self::with_version) from a string such as
    /// `2017.4.39f1`.
    pub fn with_version_str(mut self, version: &str) -> Result<Self> {
        self.version_override = Some(UnityVersion::parse_override(version)?);
        Ok(self)
    }

    pub fn with_type_tree(mut self, enabled: bool) -> Self {
        self.use_type_tree = enabled;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Restrict decoding to `classes` plus the classes they need.
    pub fn with_class_filter(mut self, classes: impl IntoIterator<Item = ClassId>) -> Self {
        let mut filter: HashSet<ClassId> = classes.into_iter().collect();
        let mut extra = ALWAYS_LOADED.to_vec();
        if filter.contains(&ClassId::MonoBehaviour) {
            extra.push(ClassId::MonoScript);
        }
        if filter.contains(&ClassId::Sprite) {
            extra.extend([ClassId::Texture2D, ClassId::SpriteAtlas]);
        }
        if filter.contains(&ClassId::Animator) {
            extra.extend([ClassId::AnimatorController, ClassId::AnimatorOverrideController]);
        }
        filter.extend(extra);
        self.class_filter = Some(filter);
        self
    }

    /// True when objects of `class_id` should be decoded.
    #[inline]
    pub fn accepts(&self, class_id: ClassId) -> bool {
        self.class_filter.as_ref().map_or(true, |f| f.contains(&class_id))
    }

    pub(crate) fn bundle_options(&self) -> BundleOptions {
        BundleOptions {
            block_compression: self.block_compression,
            block_info_compression: self.block_info_compression,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_override_must_be_complete() {
        assert!(LoadOptions::new().with_version_str("2017.4.39").is_err());
        assert!(LoadOptions::new().with_version_str("0.0.0").is_err());
        let opts = LoadOptions::new().with_version_str("2017.4.39f1").unwrap();
        assert_eq!(opts.version_override, Some(UnityVersion::new(2017, 4, 39, 'f', 1)));

        let stripped: UnityVersion = "2020.3.1".parse().unwrap();
        assert!(LoadOptions::new().with_version(stripped).is_err());
    }

    #[test]
    fn test_class_filter_prerequisites() {
        let opts = LoadOptions::new().with_class_filter([ClassId::Sprite]);
        for id in [ClassId::Sprite, ClassId::Texture2D, ClassId::SpriteAtlas, ClassId::GameObject, ClassId::AssetBundle] {
            assert!(opts.accepts(id), "{id}");
        }
        assert!(!opts.accepts(ClassId::Mesh));
        assert!(!opts.accepts(ClassId::MonoScript));

        let opts = LoadOptions::new().with_class_filter([ClassId::Animator, ClassId::MonoBehaviour]);
        assert!(opts.accepts(ClassId::AnimatorOverrideController));
        assert!(opts.accepts(ClassId::MonoScript));

        assert!(LoadOptions::default().accepts(ClassId::Mesh));
    }
}
