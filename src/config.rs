//! Processing configuration.

use std::path::PathBuf;

/// How forgiving validation should be.
///
/// Strict mode enforces ISO 32000-1 to the letter. Relaxed mode accepts a
/// documented set of real-world deviations, repairing or ignoring them with
/// a logged warning instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    Strict,
    #[default]
    Relaxed,
}

impl ValidationMode {
    pub fn is_strict(self) -> bool {
        self == ValidationMode::Strict
    }
}

/// Tunables shared by validation, optimization, and writing.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Strict or relaxed conformance checking.
    pub validation_mode: ValidationMode,
    /// Collect `http(s)` link targets per page while validating annotations
    /// and URI actions.
    pub validate_links: bool,
    /// Write a single page instead of the whole document, 1-based.
    pub extract_page_nr: Option<u32>,
    /// When extracting a page, drop annotations and outlines so only the
    /// page content survives.
    pub reduced_feature_set: bool,
    /// Directory for the persistent font cache. `None` disables caching.
    pub font_cache_dir: Option<PathBuf>,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            validation_mode: ValidationMode::Relaxed,
            validate_links: false,
            extract_page_nr: None,
            reduced_feature_set: false,
            font_cache_dir: None,
        }
    }
}

impl Configuration {
    /// Relaxed-mode configuration, the default for end-user files.
    pub fn relaxed() -> Self {
        Configuration::default()
    }

    /// Strict-mode configuration for conformance checking.
    pub fn strict() -> Self {
        Configuration {
            validation_mode: ValidationMode::Strict,
            ..Configuration::default()
        }
    }

    pub fn with_validate_links(mut self, yes: bool) -> Self {
        self.validate_links = yes;
        self
    }

    pub fn with_extract_page(mut self, page_nr: u32) -> Self {
        self.extract_page_nr = Some(page_nr);
        self
    }

    pub fn with_reduced_feature_set(mut self, yes: bool) -> Self {
        self.reduced_feature_set = yes;
        self
    }

    pub fn with_font_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.font_cache_dir = Some(dir.into());
        self
    }
}
