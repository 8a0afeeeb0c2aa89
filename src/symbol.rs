use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

/// Normalised, non-empty, uppercase equity ticker.
///
/// Construction always trims and upper-cases the input so that a [`Symbol`] can
/// be used as a map key without callers needing to normalise first.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Deserialize, Serialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    pub fn new<S>(raw: S) -> Result<Self, InvalidSymbol>
    where
        S: AsRef<str>,
    {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(InvalidSymbol);
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Symbol {
    type Error = InvalidSymbol;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("symbol must be non-empty once trimmed")]
pub struct InvalidSymbol;
