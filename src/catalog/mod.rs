//! Dropdown option sources.
//!
//! The dialogs pick a product and then a package (or plan) from lists served
//! by the admin API. This module defines the option types, the
//! [`OptionsProvider`] seam the cascading controller talks to, and the HTTP
//! implementation in [`http`].

mod http;

use crate::api::TransportError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub use http::{CatalogEndpoints, HttpCatalog};

// ============================================================================
// Option Types
// ============================================================================

/// Identifier of a selectable option.
///
/// The API serves ids as numbers in some places and strings in others; both
/// normalize to their string form. Blank ids do not exist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct OptionId(String);

impl OptionId {
    /// Parse user or form input. Blank input is "no selection".
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Normalize a JSON id (number or string). Other shapes are not ids.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of a dropdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub id: OptionId,
    pub label: String,
}

impl SelectOption {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: OptionId(id.to_string()),
            label: label.to_string(),
        }
    }
}

/// Which JSON keys carry an option's id and label.
#[derive(Debug, Clone, Copy)]
pub struct OptionSchema {
    pub id_field: &'static str,
    pub label_field: &'static str,
}

impl OptionSchema {
    pub const PRODUCT: Self = Self {
        id_field: "product_id",
        label_field: "product_Name",
    };
    pub const PACKAGE: Self = Self {
        id_field: "package_id",
        label_field: "package_Name",
    };
    /// Products as served to the client dialog.
    pub const CLIENT_PRODUCT: Self = Self {
        id_field: "product",
        label_field: "product_Name",
    };
    pub const PLAN: Self = Self {
        id_field: "plan",
        label_field: "plan_Name",
    };

    /// Map loosely-typed rows into options.
    ///
    /// Rows without a usable id are skipped. A missing label falls back to
    /// the id so the entry is still selectable.
    pub fn parse_rows(&self, rows: Vec<Value>) -> Vec<SelectOption> {
        let total = rows.len();
        let options: Vec<SelectOption> = rows
            .iter()
            .filter_map(|row| {
                let id = OptionId::from_json(row.get(self.id_field)?)?;
                let label = match row.get(self.label_field) {
                    Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
                    _ => id.to_string(),
                };
                Some(SelectOption { id, label })
            })
            .collect();

        if options.len() < total {
            tracing::warn!(
                id_field = self.id_field,
                skipped = total - options.len(),
                "Skipped option rows without a usable id"
            );
        }
        options
    }
}

// ============================================================================
// Provider Seam
// ============================================================================

/// Failure to fetch an option list.
///
/// Recovered locally by the controller into a `Failed` list status.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The fetch task died before producing a result.
    #[error("Option fetch aborted: {0}")]
    Aborted(String),
}

impl ProviderError {
    /// True when the failure was a 401. The transport has already cleared the
    /// session and redirected to login by the time the controller sees it.
    pub fn is_auth(&self) -> bool {
        matches!(self, ProviderError::Transport(TransportError::Unauthorized))
    }
}

/// Supplies primary options and, per primary id, dependent options.
#[async_trait]
pub trait OptionsProvider: Send + Sync {
    async fn fetch_primary_options(&self) -> Result<Vec<SelectOption>, ProviderError>;

    async fn fetch_dependent_options(
        &self,
        primary_id: &OptionId,
    ) -> Result<Vec<SelectOption>, ProviderError>;
}
