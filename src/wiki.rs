//! Described-option metadata sourced from the plastic wiki.
//!
//! The wiki is a directory of markdown pages, one per option, grouped by
//! kind (`production_methods/`, `material_types/`, `material_colors/`).
//! The file stem, lowercased, is the option's match key; the first heading
//! becomes the display name and the remaining body the description.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

/// Display metadata for a production method, material type, or color.
///
/// Equality is structural: two options describing the same thing compare
/// equal regardless of which database row resolved to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribedOption {
    pub name: String,
    pub display_name: String,
    pub description: String,
}

impl DescribedOption {
    /// Fallback for a persisted name with no matching wiki page. The raw
    /// name doubles as the display name so the UI never shows an empty
    /// label; the description stays empty.
    pub fn placeholder(raw_name: &str) -> Self {
        Self {
            name: raw_name.to_string(),
            display_name: raw_name.to_string(),
            description: String::new(),
        }
    }
}

/// The three description collections, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct OptionsCatalog {
    production_methods: Vec<DescribedOption>,
    material_types: Vec<DescribedOption>,
    material_colors: Vec<DescribedOption>,
}

impl OptionsCatalog {
    pub fn new(
        production_methods: Vec<DescribedOption>,
        material_types: Vec<DescribedOption>,
        material_colors: Vec<DescribedOption>,
    ) -> Self {
        Self {
            production_methods,
            material_types,
            material_colors,
        }
    }

    /// Load the catalog from a wiki directory. Missing kind directories
    /// yield empty collections, not errors: persisted names then simply
    /// fall back to placeholders in the option tree.
    pub fn load(wiki_dir: &Path) -> Result<Self> {
        let catalog = Self {
            production_methods: load_kind(&wiki_dir.join("production_methods"))?,
            material_types: load_kind(&wiki_dir.join("material_types"))?,
            material_colors: load_kind(&wiki_dir.join("material_colors"))?,
        };
        tracing::debug!(
            production_methods = catalog.production_methods.len(),
            material_types = catalog.material_types.len(),
            material_colors = catalog.material_colors.len(),
            "loaded wiki catalog"
        );
        Ok(catalog)
    }

    pub fn production_methods(&self) -> &[DescribedOption] {
        &self.production_methods
    }

    pub fn material_types(&self) -> &[DescribedOption] {
        &self.material_types
    }

    pub fn material_colors(&self) -> &[DescribedOption] {
        &self.material_colors
    }
}

fn load_kind(dir: &Path) -> Result<Vec<DescribedOption>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut pages: Vec<_> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "md"))
        .collect();
    pages.sort_by_key(|entry| entry.file_name().to_os_string());

    let mut options = Vec::new();
    for page in pages {
        let content = std::fs::read_to_string(page.path())
            .with_context(|| format!("Failed to read wiki page {}", page.path().display()))?;
        let stem = page
            .path()
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        options.push(parse_page(&stem, &content));
    }
    Ok(options)
}

/// A page never fails to parse: a missing heading just means the stem is
/// the display name and the whole body the description.
fn parse_page(stem: &str, content: &str) -> DescribedOption {
    let trimmed = content.trim_start();
    let (display_name, description) = match trimmed.strip_prefix('#') {
        Some(rest) => match rest.split_once('\n') {
            Some((heading, body)) => (
                heading.trim_start_matches('#').trim().to_string(),
                body.trim().to_string(),
            ),
            None => (rest.trim_start_matches('#').trim().to_string(), String::new()),
        },
        None => (stem.to_string(), content.trim().to_string()),
    };
    DescribedOption {
        name: stem.to_lowercase(),
        display_name,
        description,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_page(dir: &Path, kind: &str, file: &str, content: &str) {
        let kind_dir = dir.join(kind);
        std::fs::create_dir_all(&kind_dir).unwrap();
        std::fs::write(kind_dir.join(file), content).unwrap();
    }

    #[test]
    fn placeholder_carries_raw_name() {
        let option = DescribedOption::placeholder("glow-in-the-dark");
        assert_eq!(option.name, "glow-in-the-dark");
        assert_eq!(option.display_name, "glow-in-the-dark");
        assert!(option.description.is_empty());
    }

    #[test]
    fn equality_is_structural() {
        let a = DescribedOption::placeholder("red");
        let b = DescribedOption::placeholder("red");
        assert_eq!(a, b);
        let c = DescribedOption::placeholder("blue");
        assert_ne!(a, c);
    }

    #[test]
    fn load_parses_heading_and_body() {
        let dir = tempfile::tempdir().unwrap();
        write_page(
            dir.path(),
            "production_methods",
            "FDM.md",
            "# Fused Deposition Modeling\n\nMelted filament, layer by layer.\n",
        );
        let catalog = OptionsCatalog::load(dir.path()).unwrap();
        let methods = catalog.production_methods();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name, "fdm");
        assert_eq!(methods[0].display_name, "Fused Deposition Modeling");
        assert_eq!(methods[0].description, "Melted filament, layer by layer.");
    }

    #[test]
    fn load_without_heading_falls_back_to_stem() {
        let dir = tempfile::tempdir().unwrap();
        write_page(dir.path(), "material_colors", "red.md", "A bright red.\n");
        let catalog = OptionsCatalog::load(dir.path()).unwrap();
        let colors = catalog.material_colors();
        assert_eq!(colors[0].display_name, "red");
        assert_eq!(colors[0].description, "A bright red.");
    }

    #[test]
    fn missing_kind_directories_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = OptionsCatalog::load(dir.path()).unwrap();
        assert!(catalog.production_methods().is_empty());
        assert!(catalog.material_types().is_empty());
        assert!(catalog.material_colors().is_empty());
    }

    #[test]
    fn pages_load_in_file_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_page(dir.path(), "material_types", "petg.md", "# PETG\n");
        write_page(dir.path(), "material_types", "abs.md", "# ABS\n");
        write_page(dir.path(), "material_types", "pla.md", "# PLA\n");
        let catalog = OptionsCatalog::load(dir.path()).unwrap();
        let names: Vec<_> = catalog
            .material_types()
            .iter()
            .map(|o| o.name.as_str())
            .collect();
        assert_eq!(names, vec!["abs", "petg", "pla"]);
    }

    #[test]
    fn non_markdown_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_page(dir.path(), "material_colors", "red.md", "# Red\n");
        write_page(dir.path(), "material_colors", "notes.txt", "scratch\n");
        let catalog = OptionsCatalog::load(dir.path()).unwrap();
        assert_eq!(catalog.material_colors().len(), 1);
    }
}
