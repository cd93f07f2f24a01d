//! The load session: one set of loaded members and everything derived
//! from them.

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use super::inputs::{collect_inputs, merge_split_entries, Input};
use super::relations::{ObjectKey, Relations};
use super::{LoadOptions, LoadReport};
use crate::bundle::{BundleSegments, WebFile};
use crate::classes::{decode_object, ClassId, DecodeContext, DecodedObject, ImageData, ObjectCast, Sprite, SpriteAtlas, StreamingInfo, Texture2D};
use crate::core::compression::{gunzip, unbrotli};
use crate::core::{file_name_of, find_file, Progress, ProgressFn, ResourceCache};
use crate::serialized::{ObjectInfo, PPtr, SerializedFile};
use crate::stream::format::is_serialized_file;
use crate::stream::{detect, ByteView, FileType, RandomAccess};
use crate::tree::{check_schema, read_object_tree, Value};
use crate::util::{Error, Result, UnityVersion};

/// One parsed serialized file and its decoded objects.
#[derive(Debug)]
pub struct ArchiveMember {
    pub file: SerializedFile,
    pub name: Arc<str>,
    /// File on disk the member was read from (the container for archive
    /// members).
    pub source: PathBuf,
    pub objects: Vec<DecodedObject>,
    index: HashMap<i64, usize>,
}

impl ArchiveMember {
    fn new(file: SerializedFile, source: PathBuf) -> Self {
        Self { name: Arc::from(file.file_name.as_str()), file, source, objects: Vec::new(), index: HashMap::new() }
    }

    /// Decoded object by path id.
    pub fn object(&self, path_id: i64) -> Option<&DecodedObject> {
        self.index.get(&path_id).map(|&i| &self.objects[i])
    }

    /// Directory entry of an object, decoded or not.
    pub fn info(&self, path_id: i64) -> Option<&ObjectInfo> {
        self.file.objects.iter().find(|o| o.path_id == path_id)
    }

    fn push(&mut self, obj: DecodedObject) {
        self.index.insert(obj.path_id, self.objects.len());
        self.objects.push(obj);
    }
}

/// Where a byte stream came from.
#[derive(Clone, Copy)]
struct Origin<'p> {
    /// File on disk holding the bytes.
    path: &'p Path,
    /// Read straight from disk rather than out of a container.
    standalone: bool,
}

impl Origin<'_> {
    fn label(&self, name: &str) -> String {
        if self.standalone {
            self.path.display().to_string()
        } else {
            format!("{}/{}", self.path.display(), name)
        }
    }
}

/// Files of one `load_paths` call. Dependencies found while loading are
/// appended, so the list grows during iteration.
struct LoadQueue {
    files: Vec<Input>,
    /// Lowercase file names already queued.
    queued: HashSet<String>,
    /// Sibling paths known not to exist.
    missing: HashSet<PathBuf>,
}

impl LoadQueue {
    fn new(files: Vec<Input>) -> Self {
        let queued = files.iter().map(|f| f.file_name().to_lowercase()).collect();
        Self { files, queued, missing: HashSet::new() }
    }

    fn push(&mut self, path: PathBuf) {
        let input = Input::File(path);
        self.queued.insert(input.file_name().to_lowercase());
        self.files.push(input);
    }
}

/// Loaded members, shared resource streams and post-link relations.
///
/// A session owns all of its state, so independent sessions can coexist.
/// Objects are only resolvable once `load_paths` returns.
///
/// # Example
///
/// ```ignore
/// use bundlekit::manager::{LoadOptions, LoadSession};
///
/// let mut session = LoadSession::new(LoadOptions::default());
/// let report = session.load_paths(&["Game_Data"]);
/// for obj in session.objects() {
///     println!("{} {} {:?}", obj.path_id, obj.class_id, obj.name);
/// }
/// ```
pub struct LoadSession {
    options: LoadOptions,
    members: Vec<ArchiveMember>,
    /// Lowercase member name -> index into `members`.
    names: HashMap<String, usize>,
    resources: ResourceCache,
    relations: Relations,
    progress: Progress,
    cancel: Arc<AtomicBool>,
}

impl Default for LoadSession {
    fn default() -> Self {
        Self::new(LoadOptions::default())
    }
}

impl LoadSession {
    pub fn new(options: LoadOptions) -> Self {
        if let Some(v) = &options.version_override {
            info!("Specified Unity version: {v}");
        }
        Self {
            resources: ResourceCache::new(options.use_mmap),
            options,
            members: Vec::new(),
            names: HashMap::new(),
            relations: Relations::default(),
            progress: Progress::default(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    #[inline]
    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Observe `(processed, total)` during loading.
    pub fn set_progress(&mut self, callback: ProgressFn) {
        self.progress = Progress::with_callback(callback);
    }

    /// Setting the flag stops a running load from opening further files.
    /// It is cleared at the start of every load.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Load files and directories, then decode every new member's objects.
    ///
    /// Never fails as a whole; what could not be loaded is listed in the
    /// returned report.
    pub fn load_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> LoadReport {
        let mut report = LoadReport::default();
        self.cancel.store(false, Ordering::Relaxed);

        let inputs = collect_inputs(paths);
        for path in inputs.not_found {
            report.fail(path.display().to_string(), None, Error::FileNotFound(path));
        }
        let mut queue = LoadQueue::new(inputs.files);
        let first_new = self.members.len();

        self.progress.reset();
        let mut next = 0;
        while next < queue.files.len() {
            if self.cancel.load(Ordering::Relaxed) {
                info!("Loading cancelled");
                report.cancelled = true;
                break;
            }
            let input = queue.files[next].clone();
            next += 1;
            report.files += 1;
            self.load_input(&input, &mut queue, &mut report);
            self.progress.report(next, queue.files.len());
        }

        self.read_objects(first_new, &mut report);
        self.relations = Relations::build(self);
        info!(
            "Loaded {} objects from {} members ({} failures)",
            report.objects,
            report.members,
            report.failures.len()
        );
        report
    }

    fn load_input(&mut self, input: &Input, queue: &mut LoadQueue, report: &mut LoadReport) {
        let data = match input.open(self.options.use_mmap) {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to open \"{}\": {e}", input.path().display());
                report.fail(input.path().display().to_string(), None, e);
                return;
            }
        };
        let origin = Origin { path: input.path(), standalone: true };
        self.dispatch(data, origin, &input.file_name(), queue, report);
    }

    /// Route a stream to the loader for its container kind. Failures are
    /// recorded and never escape.
    fn dispatch(&mut self, data: ByteView, origin: Origin<'_>, name: &str, queue: &mut LoadQueue, report: &mut LoadReport) {
        let result = match detect(data.as_bytes()) {
            FileType::AssetsFile => match self.load_assets(data.clone(), origin, name, None, queue, report) {
                Err(e) if !origin.standalone && !e.is_stripped_version() => {
                    self.resources.register(name, RandomAccess::View(data));
                    Err(e)
                }
                other => other,
            },
            FileType::BundleFile => self.load_bundle(&data, origin, name, queue, report),
            FileType::WebFile => self.load_web(&data, origin, name, queue, report),
            FileType::GZipFile => gunzip(data.as_bytes()).map(|bytes| {
                self.dispatch(ByteView::from_vec(bytes), origin, name, queue, report);
            }),
            FileType::BrotliFile => unbrotli(data.as_bytes()).map(|bytes| {
                self.dispatch(ByteView::from_vec(bytes), origin, name, queue, report);
            }),
            FileType::ZipFile => self.load_zip(&data, origin, queue, report),
            FileType::ResourceFile => {
                if origin.standalone {
                    debug!("Skipping resource file \"{}\"", origin.path.display());
                } else {
                    self.resources.register(name, RandomAccess::View(data));
                }
                Ok(())
            }
        };
        if let Err(e) = result {
            let label = origin.label(name);
            if e.is_stripped_version() {
                error!("{e}");
            } else {
                warn!("Failed to read \"{label}\": {e}");
            }
            report.fail(label, None, e);
        }
    }

    fn load_assets(
        &mut self,
        data: ByteView,
        origin: Origin<'_>,
        name: &str,
        bundle_version: Option<&UnityVersion>,
        queue: &mut LoadQueue,
        report: &mut LoadReport,
    ) -> Result<()> {
        if self.names.contains_key(&name.to_lowercase()) {
            info!("Skipping \"{}\"", origin.label(name));
            return Ok(());
        }
        if origin.standalone {
            info!("Loading \"{}\"", origin.path.display());
        }
        let mut file = SerializedFile::parse(data, name, Some(origin.path.to_path_buf()))?;
        if let Some(version) = bundle_version {
            if file.format_version() < 7 {
                file.set_version(version.clone());
            }
        }
        self.check_version(&mut file, bundle_version)?;
        if origin.standalone {
            self.enqueue_dependencies(&file, origin.path, queue, report);
        }

        self.names.insert(name.to_lowercase(), self.members.len());
        self.members.push(ArchiveMember::new(file, origin.path.to_path_buf()));
        report.members += 1;
        Ok(())
    }

    /// Apply the override, or refuse a member whose version was stripped.
    fn check_version(&self, file: &mut SerializedFile, bundle_version: Option<&UnityVersion>) -> Result<()> {
        if let Some(version) = &self.options.version_override {
            file.set_version(version.clone());
            return Ok(());
        }
        if file.version.is_stripped() {
            return Err(Error::StrippedVersion {
                file: file.file_name.clone(),
                assumed: bundle_version.filter(|v| !v.is_stripped()).map(ToString::to_string),
            });
        }
        Ok(())
    }

    /// Queue the external files of a standalone member: the sibling path
    /// first, then anywhere below the member's directory.
    fn enqueue_dependencies(&self, file: &SerializedFile, path: &Path, queue: &mut LoadQueue, report: &mut LoadReport) {
        let Some(dir) = path.parent() else { return };
        for external in &file.externals {
            let name = external.file_name.as_str();
            if name.is_empty() {
                continue;
            }
            let key = name.to_lowercase();
            if queue.queued.contains(&key) || self.names.contains_key(&key) {
                continue;
            }
            let sibling = dir.join(name);
            if queue.missing.contains(&sibling) {
                continue;
            }
            match find_file(dir, name) {
                Some(found) => {
                    debug!("Queued dependency \"{}\"", found.display());
                    queue.push(found);
                }
                None => {
                    warn!("Dependency wasn't found: {}", sibling.display());
                    queue.missing.insert(sibling);
                    report.missing_dependencies.push(name.to_string());
                }
            }
        }
    }

    /// Every bundle of a (possibly concatenated) bundle file. Serialized
    /// members are parsed, everything else becomes a resource stream.
    fn load_bundle(
        &mut self,
        data: &ByteView,
        origin: Origin<'_>,
        name: &str,
        queue: &mut LoadQueue,
        report: &mut LoadReport,
    ) -> Result<()> {
        info!("Loading \"{}\"", origin.label(name));
        for segment in BundleSegments::new(data, self.options.bundle_options()) {
            let (offset, bundle) = segment?;
            let label = if offset == 0 {
                name.to_string()
            } else {
                info!("[MultiBundle] Loading \"{name}\" from offset: 0x{offset:X}");
                format!("{name}_0x{offset:X}")
            };
            let revision = bundle.revision();
            let inner = Origin { path: origin.path, standalone: false };
            for member in bundle.files {
                if !is_serialized_file(member.data.as_bytes()) {
                    self.resources.register(&member.file_name, RandomAccess::View(member.data));
                    continue;
                }
                let loaded =
                    self.load_assets(member.data.clone(), inner, &member.file_name, revision.as_ref(), queue, report);
                if let Err(e) = loaded {
                    let path = format!("{}/{}", label, member.file_name);
                    if e.is_stripped_version() {
                        error!("{e}");
                    } else {
                        warn!("Failed to read assets file \"{path}\": {e}");
                        self.resources.register(&member.file_name, RandomAccess::View(member.data));
                    }
                    report.fail(path, None, e);
                }
            }
        }
        Ok(())
    }

    fn load_web(
        &mut self,
        data: &ByteView,
        origin: Origin<'_>,
        name: &str,
        queue: &mut LoadQueue,
        report: &mut LoadReport,
    ) -> Result<()> {
        info!("Loading \"{}\"", origin.label(name));
        let web = WebFile::parse(data)?;
        let inner = Origin { path: origin.path, standalone: false };
        for file in web.files {
            self.dispatch(file.data, inner, &file.file_name, queue, report);
        }
        Ok(())
    }

    fn load_zip(&mut self, data: &ByteView, origin: Origin<'_>, queue: &mut LoadQueue, report: &mut LoadReport) -> Result<()> {
        info!("Reading \"{}\"", origin.path.display());
        let mut archive =
            zip::ZipArchive::new(Cursor::new(data.as_bytes())).map_err(|e| Error::invalid(format!("zip archive: {e}")))?;

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = match archive.by_index(i) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Error while reading zip entry {i}: {e}");
                    report.fail(origin.path.display().to_string(), None, Error::invalid(format!("zip entry {i}: {e}")));
                    continue;
                }
            };
            if entry.is_dir() {
                continue;
            }
            let entry_name = entry.name().to_string();
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            if let Err(e) = entry.read_to_end(&mut bytes) {
                warn!("Error while reading zip entry \"{entry_name}\": {e}");
                report.fail(format!("{}/{}", origin.path.display(), entry_name), None, Error::Io(e));
                continue;
            }
            entries.push((entry_name, bytes));
        }

        let inner = Origin { path: origin.path, standalone: false };
        for (entry_name, bytes) in merge_split_entries(entries) {
            self.dispatch(ByteView::from_vec(bytes), inner, file_name_of(&entry_name), queue, report);
        }
        Ok(())
    }

    /// Decode the objects of members `first..` in parallel.
    fn read_objects(&mut self, first: usize, report: &mut LoadReport) {
        let total: usize = self.members[first..].iter().map(|m| m.file.objects.len()).sum();
        info!("Reading {total} objects");
        self.progress.reset();

        let pool = self.options.threads.and_then(|n| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| warn!("Falling back to the global thread pool: {e}"))
                .ok()
        });

        let results: Vec<(usize, Vec<Result<DecodedObject>>)> = {
            let ctx = DecodeContext {
                resources: &self.resources,
                use_type_tree: self.options.use_type_tree,
                typeless: self.options.typeless_data,
            };
            let options = &self.options;
            let progress = &self.progress;
            let members = &self.members[first..];
            let done = AtomicUsize::new(0);
            let run = || -> Vec<(usize, Vec<Result<DecodedObject>>)> {
                members
                    .iter()
                    .enumerate()
                    .map(|(offset, member)| {
                        let index = first + offset;
                        let decoded: Vec<Result<DecodedObject>> = member
                            .file
                            .objects
                            .par_iter()
                            .filter(|info| options.accepts(ClassId(info.class_id)))
                            .map(|info| {
                                let result = decode_object(&member.file, info, index, &member.name, &ctx);
                                progress.report(done.fetch_add(1, Ordering::Relaxed) + 1, total);
                                result
                            })
                            .collect();
                        (index, decoded)
                    })
                    .collect()
            };
            match &pool {
                Some(pool) => pool.install(run),
                None => run(),
            }
        };

        for (index, decoded) in results {
            let member = &mut self.members[index];
            for result in decoded {
                match result {
                    Ok(obj) => {
                        member.push(obj);
                        report.objects += 1;
                    }
                    Err(e) => {
                        warn!("{e}");
                        let path_id = match &e {
                            Error::ObjectDecode { path_id, .. } => Some(*path_id),
                            _ => None,
                        };
                        report.fail(member.name.to_string(), path_id, e);
                    }
                }
            }
        }
    }

    /// Loaded members, in load order.
    #[inline]
    pub fn members(&self) -> &[ArchiveMember] {
        &self.members
    }

    /// Member by name, case-insensitive.
    pub fn member(&self, name: &str) -> Option<&ArchiveMember> {
        self.names.get(&name.to_lowercase()).map(|&i| &self.members[i])
    }

    /// Every decoded object of every member.
    pub fn objects(&self) -> impl Iterator<Item = &DecodedObject> {
        self.members.iter().flat_map(|m| m.objects.iter())
    }

    pub fn find(&self, member_name: &str, path_id: i64) -> Option<&DecodedObject> {
        self.member(member_name)?.object(path_id)
    }

    /// Target of `pptr` as read from member `owner`. `None` for null
    /// pointers, unknown external files and missing objects.
    pub fn resolve<T>(&self, owner: usize, pptr: &PPtr<T>) -> Option<&DecodedObject> {
        if pptr.is_null() {
            return None;
        }
        let member = self.members.get(owner)?;
        let target = match pptr.file_id {
            0 => member,
            n => {
                let external = member.file.externals.get(n as usize - 1)?;
                self.member(&external.file_name)?
            }
        };
        target.object(pptr.path_id)
    }

    /// [`resolve`](Self::resolve), typed by the pointer's target.
    pub fn resolve_as<T: ObjectCast>(&self, owner: usize, pptr: &PPtr<T>) -> Option<&T> {
        self.resolve(owner, pptr).and_then(|obj| T::cast(&obj.kind))
    }

    #[inline]
    pub fn relations(&self) -> &Relations {
        &self.relations
    }

    /// Effective atlas of a sprite: the atlas that packs it when that
    /// overrides the sprite's own pointer, the pointer's target otherwise.
    pub fn sprite_atlas(&self, sprite: &DecodedObject) -> Option<&DecodedObject> {
        if let Some(key) = self.relations.sprite_atlas(ObjectKey::of(sprite)) {
            return self.members.get(key.member)?.object(key.path_id);
        }
        let own: PPtr<SpriteAtlas> = Sprite::cast(&sprite.kind)?.sprite_atlas;
        self.resolve(sprite.member, &own)
    }

    /// Schema tree of an object, read on demand when the decode pass did
    /// not keep one.
    pub fn read_tree(&self, obj: &DecodedObject) -> Result<Value> {
        if let Some(tree) = &obj.tree {
            return Ok(tree.clone());
        }
        let member = self
            .members
            .get(obj.member)
            .ok_or_else(|| Error::other(format!("no member {} in this session", obj.member)))?;
        let info = member
            .info(obj.path_id)
            .ok_or_else(|| Error::other(format!("no object {} in {}", obj.path_id, member.name)))?;
        let schema = member
            .file
            .type_tree(info)
            .ok_or_else(|| Error::other(format!("{} carries no type tree for {}", member.name, obj.class_id)))?;
        check_schema(schema)?;
        let mut r = member.file.object_reader(info)?;
        let read = read_object_tree(&mut r, schema, self.options.typeless_data);
        if !read.complete {
            debug!(path_id = obj.path_id, consumed = read.consumed, expected = info.byte_size, "partial type tree");
        }
        Ok(read.value)
    }

    /// Bytes of an external payload referenced from member `owner`.
    pub fn read_resource(&self, owner: usize, info: &StreamingInfo) -> Result<Vec<u8>> {
        let member = self.members.get(owner).ok_or_else(|| Error::other(format!("no member {owner} in this session")))?;
        self.resources.read(&info.path, member.file.directory(), info.offset, info.size as usize)
    }

    /// Raw pixel payload of a decoded Texture2D, wherever it is stored.
    pub fn texture_image(&self, obj: &DecodedObject) -> Result<Vec<u8>> {
        let texture = Texture2D::cast(&obj.kind).ok_or_else(|| Error::TypeMismatch {
            expected: "Texture2D".into(),
            actual: obj.class_id.to_string(),
        })?;
        match &texture.image_data {
            ImageData::None => Ok(Vec::new()),
            ImageData::Owned(bytes) => Ok(bytes.clone()),
            ImageData::Streamed(info) => self.read_resource(obj.member, info),
            ImageData::Inline { offset, size } => {
                let member = self.members.get(obj.member).ok_or_else(|| Error::other("texture from another session"))?;
                let info = member.info(obj.path_id).ok_or_else(|| Error::other("texture object not in its member"))?;
                let start = info.byte_start + *offset as u64;
                let end = start + *size as u64;
                member
                    .file
                    .data()
                    .as_bytes()
                    .get(start as usize..end as usize)
                    .map(<[u8]>::to_vec)
                    .ok_or(Error::UnexpectedEof(end))
            }
        }
    }

    /// Shared resource streams of the session.
    #[inline]
    pub fn resources(&self) -> &ResourceCache {
        &self.resources
    }

    /// Drop every member, object, relation and open resource stream.
    pub fn clear(&mut self) {
        self.members.clear();
        self.names.clear();
        self.resources.clear();
        self.relations = Relations::default();
        self.progress.reset();
    }
}
