//! Option tree assembly for the material selection UI.
//!
//! Joins the persisted production methods, material types, and materials
//! with the wiki catalog into a three-level tree of described options,
//! pruning branches that offer nothing to select.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::store::db::TicketDb;
use crate::wiki::{DescribedOption, OptionsCatalog};

/// Leaf node: one selectable color under a material type. Equality follows
/// the wrapped description's value, so two database colors resolving to
/// the same description count as the same node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialColorOption {
    #[serde(flatten)]
    pub option: DescribedOption,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialTypeOption {
    #[serde(flatten)]
    pub option: DescribedOption,
    pub material_colors: Vec<MaterialColorOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionMethodOption {
    #[serde(flatten)]
    pub option: DescribedOption,
    pub material_types: Vec<MaterialTypeOption>,
}

/// Resolve a persisted name against a description collection. Catalog
/// names are pre-lowercased, so the match is case-insensitive on the
/// stored name; anything unmatched degrades to a placeholder.
fn describe(collection: &[DescribedOption], raw_name: &str) -> DescribedOption {
    let lowered = raw_name.to_lowercase();
    collection
        .iter()
        .find(|d| d.name == lowered)
        .cloned()
        .unwrap_or_else(|| DescribedOption::placeholder(raw_name))
}

/// Build the pruned production-method → material-type → color tree.
///
/// Methods appear in persistence order. A material type with no colors,
/// and a method with no remaining types, are dropped from the output.
pub fn build_option_tree(
    db: &TicketDb,
    catalog: &OptionsCatalog,
) -> Result<Vec<ProductionMethodOption>> {
    let mut methods = Vec::new();

    for method in db.list_production_methods()? {
        let mut material_types = Vec::new();

        for material_type in db.list_material_types(method.id)? {
            let mut material_colors: Vec<MaterialColorOption> = Vec::new();

            for material in db.list_materials(material_type.id)? {
                let color = db.get_material_color(material.color_id)?.with_context(|| {
                    format!(
                        "material {} references missing color {}",
                        material.id, material.color_id
                    )
                })?;
                let color_option = MaterialColorOption {
                    option: describe(catalog.material_colors(), &color.name),
                };
                if !material_colors.contains(&color_option) {
                    material_colors.push(color_option);
                }
            }

            if !material_colors.is_empty() {
                material_types.push(MaterialTypeOption {
                    option: describe(catalog.material_types(), &material_type.name),
                    material_colors,
                });
            }
        }

        if !material_types.is_empty() {
            methods.push(ProductionMethodOption {
                option: describe(catalog.production_methods(), &method.name),
                material_types,
            });
        }
    }

    Ok(methods)
}
