//! Parsing error types for the site parser

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// The element every valid page carries is missing
    #[error("Expected page structure not found: {selector}")]
    StructureNotFound { selector: String },

    /// The site served its sign-in form instead of content
    #[error("Page asks for sign-in")]
    LoginRequired,

    #[error("Invalid value for '{field}': {value}")]
    InvalidField { field: String, value: String },
}

impl ParsingError {
    pub fn invalid_selector(selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn structure_not_found(selector: &str) -> Self {
        Self::StructureNotFound {
            selector: selector.to_string(),
        }
    }

    pub fn invalid_field(field: &str, value: &str) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;
