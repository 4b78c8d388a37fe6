use std::path::Path;

use serde::{Deserialize, Serialize};

/// Width at which ticket messages wrap when rendered as rows.
const MESSAGE_COLS: usize = 77;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionMethod {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialType {
    pub id: i64,
    pub production_method_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialColor {
    pub id: i64,
    pub name: String,
}

/// A physical material that is or was in stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub id: i64,
    pub material_type_id: i64,
    pub color_id: i64,
    pub name: String,
    pub url: String,
    pub optimal_temp: f64,
    pub min_temp: f64,
    pub max_temp: f64,
}

/// One physical spool/unit, identified by its internal label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialStock {
    pub id: i64,
    pub material_id: i64,
    pub label: i64,
    pub consumed: bool,
}

/// Stock listing row with the joined material names for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockItem {
    pub id: i64,
    pub material_id: i64,
    pub label: i64,
    pub consumed: bool,
    pub material_name: String,
    pub material_type_name: String,
    pub color_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub message: String,
    pub created_at: String,
}

impl Ticket {
    pub fn url(&self, hostname: &str) -> String {
        format!("{}/tickets/{}", hostname.trim_end_matches('/'), self.id)
    }

    /// Number of visual rows the message occupies when wrapped at 77
    /// columns. Each physical line contributes at least one row; an empty
    /// message has no lines and counts zero.
    pub fn message_row_count(&self) -> usize {
        self.message
            .lines()
            .map(|line| textwrap::wrap(line, MESSAGE_COLS).len().max(1))
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintConfig {
    pub id: i64,
    pub file_path: String,
    pub count: i64,
    pub material_type_id: i64,
    pub color_id: i64,
    pub user_id: i64,
    pub ticket_id: Option<i64>,
}

impl PrintConfig {
    pub fn file_name(&self) -> String {
        Path::new(&self.file_path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Download URL for the referenced file, once attached to a ticket.
    pub fn file_url(&self, hostname: &str) -> Option<String> {
        self.ticket_id.map(|ticket_id| {
            format!(
                "{}/tickets/{}/files/{}",
                hostname.trim_end_matches('/'),
                ticket_id,
                self.file_name()
            )
        })
    }
}

/// Input for a print config on ticket submission; the ticket id is
/// assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPrintConfig {
    pub file_path: String,
    pub count: i64,
    pub material_type_id: i64,
    pub color_id: i64,
    pub user_id: i64,
}

/// A ticket together with its print configs, used for API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub print_configs: Vec<PrintConfig>,
}
