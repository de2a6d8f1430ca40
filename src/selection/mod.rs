// Attribute selection
// Ordered set of attributes a host has picked for one flight

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SelectionError {
    #[error("At least {required} attributes must be selected, got {selected}")]
    TooFewAttributes { required: usize, selected: usize },
}

/// Charts need two attributes to plot one against another
pub const MIN_CHART_ATTRIBUTES: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeSelection {
    attributes: Vec<String>,
}

impl AttributeSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut selection = Self::new();
        for name in names {
            selection.select(name);
        }
        selection
    }

    pub fn clear(&mut self) {
        self.attributes.clear();
    }

    /// Add an attribute; returns false if it was already selected
    pub fn select(&mut self, name: &str) -> bool {
        if self.attributes.iter().any(|a| a == name) {
            return false;
        }
        self.attributes.push(name.to_string());
        true
    }

    pub fn selected(&self) -> Vec<&str> {
        self.attributes.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn require_at_least(&self, required: usize) -> Result<(), SelectionError> {
        if self.attributes.len() < required {
            return Err(SelectionError::TooFewAttributes {
                required,
                selected: self.attributes.len(),
            });
        }
        Ok(())
    }
}
