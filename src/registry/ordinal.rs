//! Ordinal view over the registry listing.
//!
//! Ordinals are 1-based positions in the current insertion-ordered listing. They
//! are never stored: every query or delete re-resolves them against a fresh
//! listing.

use super::RegistryEntry;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum OrdinalError {
    #[error("Invalid file number: {0}. Please provide a valid number.")]
    NotANumber(String),

    #[error("Invalid file number: {0}. Use 'list' to see available files.")]
    OutOfRange(String),
}

/// Resolve the user-supplied ordinal text to a `file_id`.
pub fn resolve_ordinal(entries: &[RegistryEntry], ordinal: &str) -> Result<String, OrdinalError> {
    let trimmed = ordinal.trim();
    let number: i64 = match trimmed.parse() {
        Ok(number) => number,
        // A digit run too long for i64 is still a number, just not a listed one
        Err(_) if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) => {
            return Err(OrdinalError::OutOfRange(trimmed.to_string()));
        }
        Err(_) => return Err(OrdinalError::NotANumber(trimmed.to_string())),
    };

    if number < 1 || number as u64 > entries.len() as u64 {
        return Err(OrdinalError::OutOfRange(trimmed.to_string()));
    }

    Ok(entries[(number - 1) as usize].file_id.clone())
}
