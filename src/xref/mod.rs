//! The cross-reference table: the single source of truth for a document.
//!
//! Every numbered object lives in exactly one slot. A slot is free, holds a
//! regular object, or records that the object sits inside an object stream
//! (ISO 32000-1, 7.5.4 and 7.5.7). The table also owns the trailer, the
//! effective version, and the working state validation accumulates: the
//! visited-marker set, the page cursor, flattened name trees, and per-page
//! annotation and link-target maps.

pub mod dereference;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::warn;

use crate::config::ValidationMode;
use crate::error::{PdfError, Result};
use crate::objects::{Dict, Object, Reference};
use crate::version::Version;

/// Flattened name tree: key bytes to value object, ordered like the tree.
pub type NameTreeMap = BTreeMap<Vec<u8>, Object>;

/// One slot of the table.
#[derive(Debug, Clone, PartialEq)]
pub enum XRefEntry {
    /// Released slot, part of the free list.
    Free { gen_nr: u16, next_free: u32 },
    /// Regular object.
    InUse { gen_nr: u16, object: Object },
    /// Object stored in a compressed object stream. Generation is
    /// implicitly zero.
    Compressed {
        stream_obj_nr: u32,
        stream_index: u32,
        object: Object,
    },
}

impl XRefEntry {
    pub fn gen_nr(&self) -> u16 {
        match self {
            XRefEntry::Free { gen_nr, .. } | XRefEntry::InUse { gen_nr, .. } => *gen_nr,
            XRefEntry::Compressed { .. } => 0,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, XRefEntry::Free { .. })
    }

    /// The stored object, when the slot holds one.
    pub fn object(&self) -> Option<&Object> {
        match self {
            XRefEntry::Free { .. } => None,
            XRefEntry::InUse { object, .. } | XRefEntry::Compressed { object, .. } => Some(object),
        }
    }
}

/// What validation remembers about one annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRecord {
    pub subtype: String,
    pub rect: Option<[f64; 4]>,
    /// `/NM`, the per-page unique annotation name.
    pub id: Option<String>,
    /// Object number, absent for annotations written inline in `/Annots`.
    pub obj_nr: Option<u32>,
}

/// Per-page annotations, keyed by subtype, then by object number (or a
/// negative synthetic key for inline annotation dicts).
pub type PageAnnotations = BTreeMap<String, BTreeMap<i64, AnnotationRecord>>;

/// Tallies and notices accumulated across validation and optimization.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub page_count: u32,
    pub annotations: u32,
    /// Validated annotations per subtype.
    pub annotation_types: BTreeMap<String, u32>,
    pub fonts: u32,
    pub duplicate_fonts: u32,
    pub images: u32,
    pub duplicate_images: u32,
    pub freed_objects: u32,
    /// Human-readable notes, one per relaxed-mode repair.
    pub repairs: Vec<String>,
}

/// The cross-reference table.
#[derive(Debug, Clone)]
pub struct XRefTable {
    entries: HashMap<u32, XRefEntry>,
    pub trailer: Dict,
    /// Version from the file header line.
    pub header_version: Version,
    /// Catalog `/Version` override, once seen.
    pub catalog_version: Option<Version>,
    pub validation_mode: ValidationMode,
    /// Collect `http(s)` link targets per page while validating.
    pub validate_links: bool,

    // Walk state.
    cur_obj: u32,
    cur_page: u32,
    marked: HashSet<u32>,

    // Validation products.
    name_trees: HashMap<String, NameTreeMap>,
    page_annots: BTreeMap<u32, PageAnnotations>,
    page_uris: BTreeMap<u32, BTreeSet<String>>,
    inline_annot_seq: i64,

    pub stats: Statistics,
}

impl XRefTable {
    pub fn new(header_version: Version) -> Self {
        XRefTable {
            entries: HashMap::new(),
            trailer: Dict::new(),
            header_version,
            catalog_version: None,
            validation_mode: ValidationMode::Relaxed,
            validate_links: false,
            cur_obj: 0,
            cur_page: 0,
            marked: HashSet::new(),
            name_trees: HashMap::new(),
            page_annots: BTreeMap::new(),
            page_uris: BTreeMap::new(),
            inline_annot_seq: 0,
            stats: Statistics::default(),
        }
    }

    /// Effective version: the later of the header and the catalog override.
    pub fn version(&self) -> Version {
        match self.catalog_version {
            Some(v) if v > self.header_version => v,
            _ => self.header_version,
        }
    }

    pub fn is_strict(&self) -> bool {
        self.validation_mode.is_strict()
    }

    /// Feature gate. In strict mode a feature used below its introduction
    /// version fails; relaxed mode logs and carries on.
    pub fn validate_version(&self, feature: &str, since: Version) -> Result<()> {
        let current = self.version();
        if since <= current {
            return Ok(());
        }
        if self.is_strict() {
            return Err(PdfError::VersionViolation {
                feature: feature.to_string(),
                since,
                current,
                obj_nr: self.cur_obj,
            });
        }
        warn!(feature, %since, %current, "feature predates document version");
        Ok(())
    }

    // --- slot management ---

    pub fn insert(&mut self, obj_nr: u32, entry: XRefEntry) {
        self.entries.insert(obj_nr, entry);
    }

    /// Stores `object` under `obj_nr` with generation 0.
    pub fn insert_object(&mut self, obj_nr: u32, object: impl Into<Object>) -> Reference {
        self.entries.insert(
            obj_nr,
            XRefEntry::InUse {
                gen_nr: 0,
                object: object.into(),
            },
        );
        Reference::new(obj_nr, 0)
    }

    /// Stores `object` in the next unused slot.
    pub fn push_object(&mut self, object: impl Into<Object>) -> Reference {
        let obj_nr = self.max_obj_nr() + 1;
        self.insert_object(obj_nr, object)
    }

    pub fn lookup(&self, obj_nr: u32) -> Option<&XRefEntry> {
        self.entries.get(&obj_nr)
    }

    pub fn contains(&self, obj_nr: u32) -> bool {
        self.entries.contains_key(&obj_nr)
    }

    /// Replaces the object stored in an in-use or compressed slot.
    pub fn update_object(&mut self, obj_nr: u32, new: Object) -> Result<()> {
        match self.entries.get_mut(&obj_nr) {
            Some(XRefEntry::InUse { object, .. }) | Some(XRefEntry::Compressed { object, .. }) => {
                *object = new;
                Ok(())
            }
            Some(XRefEntry::Free { gen_nr, .. }) => Err(PdfError::DanglingRef {
                obj_nr,
                gen_nr: *gen_nr,
            }),
            None => Err(PdfError::DanglingRef { obj_nr, gen_nr: 0 }),
        }
    }

    /// Rewrites one entry of the dict stored under `obj_nr`. Used by
    /// relaxed-mode repairs.
    pub fn set_dict_entry(&mut self, obj_nr: u32, key: &str, value: Object) -> Result<()> {
        self.patch_dict(obj_nr, |d| {
            d.set(key, value);
        })
    }

    /// Deletes one entry of the dict stored under `obj_nr`.
    pub fn remove_dict_entry(&mut self, obj_nr: u32, key: &str) -> Result<()> {
        self.patch_dict(obj_nr, |d| {
            d.remove(key);
        })
    }

    fn patch_dict(&mut self, obj_nr: u32, f: impl FnOnce(&mut Dict)) -> Result<()> {
        let entry = self
            .entries
            .get_mut(&obj_nr)
            .ok_or(PdfError::DanglingRef { obj_nr, gen_nr: 0 })?;
        match entry {
            XRefEntry::InUse { object, .. } | XRefEntry::Compressed { object, .. } => match object
            {
                Object::Dict(d) => {
                    f(d);
                    Ok(())
                }
                Object::Stream(sd) => {
                    f(&mut sd.dict);
                    Ok(())
                }
                other => Err(PdfError::corrupt(
                    obj_nr,
                    format!("cannot patch entry of a {}", other.type_name()),
                )),
            },
            XRefEntry::Free { gen_nr, .. } => Err(PdfError::DanglingRef {
                obj_nr,
                gen_nr: *gen_nr,
            }),
        }
    }

    /// Releases a slot onto the free list, bumping its generation.
    pub fn free_object(&mut self, obj_nr: u32, next_free: u32) {
        let gen_nr = self
            .entries
            .get(&obj_nr)
            .map(|e| e.gen_nr().saturating_add(1))
            .unwrap_or(0);
        self.entries
            .insert(obj_nr, XRefEntry::Free { gen_nr, next_free });
    }

    /// Guarantees the conventional head of the free list: object 0, free,
    /// generation 65535.
    pub fn ensure_free_head(&mut self) {
        if !matches!(self.entries.get(&0), Some(XRefEntry::Free { .. })) {
            self.entries.insert(
                0,
                XRefEntry::Free {
                    gen_nr: 65535,
                    next_free: 0,
                },
            );
        }
    }

    /// Rebuilds the free list as one ascending chain from slot 0, closing
    /// back on 0. Generations stay as they are.
    pub fn relink_free_list(&mut self) {
        self.ensure_free_head();
        let free: Vec<(u32, u16)> = self
            .sorted_obj_nrs()
            .into_iter()
            .filter(|&nr| nr != 0)
            .filter_map(|nr| match self.entries.get(&nr) {
                Some(XRefEntry::Free { gen_nr, .. }) => Some((nr, *gen_nr)),
                _ => None,
            })
            .collect();
        let mut next = 0u32;
        for &(nr, gen_nr) in free.iter().rev() {
            self.entries.insert(
                nr,
                XRefEntry::Free {
                    gen_nr,
                    next_free: next,
                },
            );
            next = nr;
        }
        self.entries.insert(
            0,
            XRefEntry::Free {
                gen_nr: 65535,
                next_free: next,
            },
        );
    }

    pub fn max_obj_nr(&self) -> u32 {
        self.entries.keys().copied().max().unwrap_or(0)
    }

    /// Table extent as the trailer `/Size` should state it.
    pub fn size(&self) -> u32 {
        self.max_obj_nr() + 1
    }

    /// Object numbers of all slots, ascending.
    pub fn sorted_obj_nrs(&self) -> Vec<u32> {
        let mut nrs: Vec<u32> = self.entries.keys().copied().collect();
        nrs.sort_unstable();
        nrs
    }

    // --- walk state ---

    /// Object number errors are attributed to.
    pub fn cur_obj(&self) -> u32 {
        self.cur_obj
    }

    pub fn set_cur_obj(&mut self, obj_nr: u32) {
        self.cur_obj = obj_nr;
    }

    /// 1-based page number of the page being walked, 0 outside a page.
    pub fn cur_page(&self) -> u32 {
        self.cur_page
    }

    pub fn set_cur_page(&mut self, page_nr: u32) {
        self.cur_page = page_nr;
    }

    /// Advances the page cursor and returns the new page number.
    pub fn advance_page(&mut self) -> u32 {
        self.cur_page += 1;
        self.cur_page
    }

    /// True when `obj_nr` was already visited by the current validation.
    pub fn is_marked(&self, obj_nr: u32) -> bool {
        self.marked.contains(&obj_nr)
    }

    /// Marks `obj_nr` as visited. Returns false when it already was.
    pub fn mark(&mut self, obj_nr: u32) -> bool {
        self.marked.insert(obj_nr)
    }

    /// Resets everything a validation run accumulates.
    pub fn reset_validation_state(&mut self) {
        self.cur_obj = 0;
        self.cur_page = 0;
        self.marked.clear();
        self.name_trees.clear();
        self.page_annots.clear();
        self.page_uris.clear();
        self.inline_annot_seq = 0;
        self.stats = Statistics::default();
    }

    /// Records a relaxed-mode repair both in the log and in the statistics.
    pub fn note_repair(&mut self, what: impl Into<String>) {
        let what = what.into();
        warn!(repair = %what, "repaired");
        self.stats.repairs.push(what);
    }

    // --- validation products ---

    pub fn name_tree(&self, tree: &str) -> Option<&NameTreeMap> {
        self.name_trees.get(tree)
    }

    pub fn name_tree_mut(&mut self, tree: &str) -> &mut NameTreeMap {
        self.name_trees.entry(tree.to_string()).or_default()
    }

    /// Looks a key up in a flattened name tree.
    pub fn lookup_name(&self, tree: &str, key: &[u8]) -> Option<&Object> {
        self.name_trees.get(tree).and_then(|m| m.get(key))
    }

    pub fn record_annotation(&mut self, page_nr: u32, record: AnnotationRecord) {
        let key = match record.obj_nr {
            Some(nr) => nr as i64,
            None => {
                self.inline_annot_seq -= 1;
                self.inline_annot_seq
            }
        };
        *self
            .stats
            .annotation_types
            .entry(record.subtype.clone())
            .or_default() += 1;
        self.page_annots
            .entry(page_nr)
            .or_default()
            .entry(record.subtype.clone())
            .or_default()
            .insert(key, record);
        self.stats.annotations += 1;
    }

    pub fn page_annotations(&self) -> &BTreeMap<u32, PageAnnotations> {
        &self.page_annots
    }

    pub fn record_page_uri(&mut self, page_nr: u32, uri: impl Into<String>) {
        self.page_uris.entry(page_nr).or_default().insert(uri.into());
    }

    pub fn page_uris(&self) -> &BTreeMap<u32, BTreeSet<String>> {
        &self.page_uris
    }

    // --- document roots ---

    /// The catalog dict the trailer `/Root` points at.
    pub fn catalog(&self) -> Result<Dict> {
        let root = self.trailer.get("Root").ok_or_else(|| {
            PdfError::MissingRequired {
                dict: "trailer".to_string(),
                entry: "Root".to_string(),
                obj_nr: 0,
            }
        })?;
        match self.dereference(root)? {
            Object::Dict(d) => Ok(d),
            Object::Null => Err(PdfError::corrupt(0, "trailer /Root resolves to null")),
            other => Err(PdfError::TypeMismatch {
                dict: "trailer".to_string(),
                entry: "Root".to_string(),
                expected: "dict",
                found: other.type_name(),
                obj_nr: 0,
            }),
        }
    }

    /// Object number behind the trailer `/Root`, when indirect.
    pub fn catalog_obj_nr(&self) -> Option<u32> {
        self.trailer.reference("Root").map(|r| r.obj_nr())
    }
}

impl Default for XRefTable {
    fn default() -> Self {
        XRefTable::new(Version::default())
    }
}
