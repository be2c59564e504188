//! Domain-specific errors.

use thiserror::Error;

use crate::domain::model::Field;

/// Recoverable failures reported back to whoever triggered a selection.
///
/// None of these are fatal to a session: after any of them the session holds exactly the state it
/// had before the failed operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[error("no repeating container found for the clicked element")]
    NoRepeatingContainerFound,
    #[error("no relative selector leads from the item to the clicked element")]
    NoRelativeSelectorFound,
    #[error("select an item before selecting fields")]
    ItemNotSelected,
    #[error("clicked element is outside every matched item")]
    ClickOutsideItem,
    #[error("field '{0}' is not enabled for this session")]
    FieldNotEnabled(Field),
}

impl SelectError {
    pub(crate) fn invalid(selector: impl Into<String>, reason: impl Into<String>) -> Self {
        SelectError::InvalidSelector {
            selector: selector.into(),
            reason: reason.into(),
        }
    }
}

pub type SelectResult<T> = Result<T, SelectError>;
