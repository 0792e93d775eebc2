//! # pdfproc
//!
//! A pure Rust PDF core engine: cross-reference object model, ISO 32000-1
//! conformance validation with relaxed-mode repair, TrueType subsetting,
//! resource optimization, and deterministic writing.
//!
//! ## Features
//!
//! - **Object model**: fully decoded PDF objects over a cross-reference
//!   table with typed dereferencing
//! - **Validation**: every structural surface of a document (catalog, page
//!   tree, annotations, actions, destinations, outlines, forms, name trees,
//!   threads, fonts) in strict or relaxed mode
//! - **Repair**: relaxed mode fixes what real-world files get wrong and
//!   reports every repair it makes
//! - **Fonts**: TrueType parsing, glyph subsetting without renumbering, and
//!   a verified on-disk cache
//! - **Optimization**: duplicate font/image elimination and garbage
//!   collection
//! - **Writing**: deterministic serialization, single-page extraction
//!
//! ## Quick Start
//!
//! ```rust
//! use pdfproc::{Configuration, Context, Dict, Object, Reference, Version, XRefTable};
//!
//! # fn main() -> pdfproc::Result<()> {
//! // Populate a table (a parser would normally do this).
//! let mut xref = XRefTable::new(Version::V17);
//! xref.ensure_free_head();
//! xref.insert_object(
//!     1,
//!     Dict::new()
//!         .with("Type", Object::name("Catalog"))
//!         .with("Pages", Reference::new(2, 0)),
//! );
//! xref.insert_object(
//!     2,
//!     Dict::new()
//!         .with("Type", Object::name("Pages"))
//!         .with("Kids", Vec::<Object>::new())
//!         .with("Count", 0i64),
//! );
//! xref.trailer.set("Root", Reference::new(1, 0));
//! xref.trailer.set("Size", xref.size() as i64);
//!
//! // Validate, optimize, write.
//! let mut ctx = Context::new(Configuration::relaxed(), xref);
//! ctx.validate()?;
//! ctx.optimize()?;
//! let mut out = Vec::new();
//! ctx.write_to(&mut out)?;
//! assert!(out.starts_with(b"%PDF-"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`objects`] - the decoded object model
//! - [`xref`] - cross-reference table, dereferencing, walk state
//! - [`validate`] - structural validators and the relaxed-mode repairs
//! - [`filters`] - stream decode pipeline
//! - [`font`] - TrueType parsing, subsetting, caching
//! - [`optimize`] - duplicate elimination and garbage collection
//! - [`writer`] - deterministic document serialization
//! - [`context`] - the per-document orchestrator

pub mod config;
pub mod context;
pub mod date;
pub mod destination;
pub mod error;
pub mod filters;
pub mod font;
pub mod objects;
pub mod optimize;
pub mod validate;
pub mod version;
pub mod writer;
pub mod xref;

pub use config::{Configuration, ValidationMode};
pub use context::{Context, ObjectSource};
pub use error::{PdfError, Result};
pub use objects::{Dict, Name, Object, Reference, StreamDict};
pub use version::Version;
pub use xref::{Statistics, XRefEntry, XRefTable};
