//! The processing context: one document, one configuration, one table.
//!
//! Lifecycle: construct (directly or from an [`ObjectSource`]) → validate →
//! optionally optimize → write. The context owns the cross-reference table
//! for its whole life; walks mutate it in place. Independent documents get
//! independent contexts.

use std::collections::BTreeMap;
use std::io::Write;

use crate::config::Configuration;
use crate::error::Result;
use crate::objects::Object;
use crate::optimize::optimize_document;
use crate::validate::validate_document;
use crate::writer::write_document;
use crate::xref::{NameTreeMap, PageAnnotations, Statistics, XRefTable};

/// Where objects come from. A file-backed lexer implements this; tests
/// populate tables programmatically and skip it.
pub trait ObjectSource {
    /// Parses the cross-reference skeleton: header version, trailer, and
    /// whatever slots the source resolves eagerly.
    fn read_xref_table(&mut self) -> Result<XRefTable>;

    /// Parses the object belonging to a slot the skeleton left empty.
    /// `Ok(None)` leaves the slot unresolved.
    fn read_object_at(&mut self, obj_nr: u32) -> Result<Option<Object>>;
}

pub struct Context {
    config: Configuration,
    xref: XRefTable,
}

impl Context {
    /// Wraps an already-populated table. The configuration's validation
    /// mode and link collection flag are copied onto the table.
    pub fn new(config: Configuration, mut xref: XRefTable) -> Self {
        xref.validation_mode = config.validation_mode;
        xref.validate_links = config.validate_links;
        Context { config, xref }
    }

    /// Reads the table from a source, then fills every slot the skeleton
    /// announced (via the trailer `/Size`) but did not resolve.
    pub fn from_source(config: Configuration, source: &mut dyn ObjectSource) -> Result<Self> {
        let mut xref = source.read_xref_table()?;
        let size = xref
            .trailer
            .integer("Size")
            .unwrap_or_else(|| xref.size() as i64);
        for obj_nr in 1..size.max(0) as u32 {
            if xref.contains(obj_nr) {
                continue;
            }
            if let Some(object) = source.read_object_at(obj_nr)? {
                xref.insert_object(obj_nr, object);
            }
        }
        Ok(Context::new(config, xref))
    }

    /// Validates the whole document per the configured mode.
    pub fn validate(&mut self) -> Result<()> {
        validate_document(&mut self.xref)
    }

    /// Collapses duplicate resources and sweeps unreachable objects.
    /// Expects [`validate`](Context::validate) to have succeeded.
    pub fn optimize(&mut self) -> Result<()> {
        optimize_document(&mut self.xref)
    }

    /// Serializes the document, honoring page extraction settings.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        write_document(&self.xref, &self.config, out)
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn xref(&self) -> &XRefTable {
        &self.xref
    }

    pub fn xref_mut(&mut self) -> &mut XRefTable {
        &mut self.xref
    }

    /// Tallies accumulated by validation and optimization.
    pub fn statistics(&self) -> &Statistics {
        &self.xref.stats
    }

    /// Validated annotations, keyed by 1-based page number.
    pub fn page_annotations(&self) -> &BTreeMap<u32, PageAnnotations> {
        self.xref.page_annotations()
    }

    /// Flattened name tree, when validation saw one.
    pub fn name_tree(&self, tree: &str) -> Option<&NameTreeMap> {
        self.xref.name_tree(tree)
    }

    /// Single key lookup against a flattened name tree.
    pub fn lookup_name(&self, tree: &str, key: &[u8]) -> Option<&Object> {
        self.xref.lookup_name(tree, key)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::objects::{Dict, Reference};
    use crate::version::Version;

    fn minimal_table() -> XRefTable {
        let mut xref = XRefTable::new(Version::V17);
        xref.ensure_free_head();
        xref.insert_object(
            1,
            Dict::new()
                .with("Type", Object::name("Catalog"))
                .with("Pages", Reference::new(2, 0)),
        );
        xref.insert_object(
            2,
            Dict::new()
                .with("Type", Object::name("Pages"))
                .with("Kids", Vec::<Object>::new())
                .with("Count", 0i64),
        );
        xref.trailer.set("Root", Reference::new(1, 0));
        xref.trailer.set("Size", xref.size() as i64);
        xref
    }

    struct CannedSource {
        table: XRefTable,
        lazy: HashMap<u32, Object>,
        reads: u32,
    }

    impl ObjectSource for CannedSource {
        fn read_xref_table(&mut self) -> Result<XRefTable> {
            Ok(self.table.clone())
        }

        fn read_object_at(&mut self, obj_nr: u32) -> Result<Option<Object>> {
            self.reads += 1;
            Ok(self.lazy.get(&obj_nr).cloned())
        }
    }

    #[test]
    fn test_configuration_propagates_onto_the_table() {
        let ctx = Context::new(
            Configuration::strict().with_validate_links(true),
            XRefTable::new(Version::V14),
        );
        assert!(ctx.xref().is_strict());
        assert!(ctx.xref().validate_links);
    }

    #[test]
    fn test_from_source_fills_announced_slots() {
        let mut table = minimal_table();
        // Announce one more object than the skeleton resolves.
        table.trailer.set("Size", 4i64);
        let mut source = CannedSource {
            table,
            lazy: HashMap::from([(3, Object::Dict(Dict::new().with("Late", true)))]),
            reads: 0,
        };
        let ctx = Context::from_source(Configuration::relaxed(), &mut source).unwrap();
        assert!(ctx.xref().contains(3));
        assert_eq!(source.reads, 1);
    }

    #[test]
    fn test_full_lifecycle() {
        let mut ctx = Context::new(Configuration::strict(), minimal_table());
        ctx.validate().unwrap();
        ctx.optimize().unwrap();
        let mut out = Vec::new();
        ctx.write_to(&mut out).unwrap();
        assert!(out.starts_with(b"%PDF-1.7\n"));
        assert_eq!(ctx.statistics().page_count, 0);
        assert!(ctx.page_annotations().is_empty());
    }

    #[test]
    fn test_name_tree_access_before_validation_is_empty() {
        let ctx = Context::new(Configuration::relaxed(), minimal_table());
        assert!(ctx.name_tree("Dests").is_none());
        assert!(ctx.lookup_name("Dests", b"intro").is_none());
    }
}
