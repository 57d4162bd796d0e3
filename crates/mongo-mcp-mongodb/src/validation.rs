//! Name validation for databases and collections.
//!
//! Names are checked before any I/O so a malformed request never reaches the
//! driver.

use mongo_mcp_common::{MongoMcpError, Result};
use tracing::warn;

/// MongoDB rejects database names longer than 64 bytes
const MAX_DATABASE_NAME_BYTES: usize = 64;

/// Maximum allowed length for collection names (MongoDB limit is 255, we're more conservative)
const MAX_COLLECTION_NAME_LENGTH: usize = 120;

const FORBIDDEN_DATABASE_CHARS: &[char] = &['/', '\\', '.', ' ', '"', '$', '*', '<', '>', ':', '|', '?', '\0'];

/// Validated database name
///
/// - Not empty
/// - At most 64 bytes
/// - None of `/\. "$*<>:|?` or NUL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedDatabaseName {
    name: String,
}

impl ValidatedDatabaseName {
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(MongoMcpError::Validation(
                "Database name cannot be empty".to_string(),
            ));
        }

        if name.len() > MAX_DATABASE_NAME_BYTES {
            return Err(MongoMcpError::Validation(format!(
                "Database name exceeds maximum length of {} bytes: '{}'",
                MAX_DATABASE_NAME_BYTES, name
            )));
        }

        if let Some(c) = name.chars().find(|c| FORBIDDEN_DATABASE_CHARS.contains(c)) {
            return Err(MongoMcpError::Validation(format!(
                "Database name cannot contain {:?}: '{}'",
                c,
                name.replace('\0', "\\0")
            )));
        }

        Ok(Self {
            name: name.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl AsRef<str> for ValidatedDatabaseName {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for ValidatedDatabaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Validated collection name
///
/// # Guarantees
/// - Not empty
/// - Maximum 120 characters
/// - No null bytes
/// - No "system." prefix (system collections)
/// - No $ characters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCollectionName {
    name: String,
}

impl ValidatedCollectionName {
    /// Creates a new validated collection name
    ///
    /// # Errors
    /// Returns ValidationError if:
    /// - Name is empty
    /// - Name exceeds MAX_COLLECTION_NAME_LENGTH
    /// - Name contains null bytes
    /// - Name starts with "system."
    /// - Name contains $ characters
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(MongoMcpError::Validation(
                "Collection name cannot be empty".to_string(),
            ));
        }

        if name.chars().count() > MAX_COLLECTION_NAME_LENGTH {
            return Err(MongoMcpError::Validation(format!(
                "Collection name exceeds maximum length of {} characters: '{}'",
                MAX_COLLECTION_NAME_LENGTH, name
            )));
        }

        if name.contains('\0') {
            return Err(MongoMcpError::Validation(
                "Collection name cannot contain null bytes".to_string(),
            ));
        }

        if name.starts_with("system.") {
            return Err(MongoMcpError::Validation(format!(
                "Collection name cannot start with 'system.' (reserved): '{}'",
                name
            )));
        }

        if name.contains('$') {
            return Err(MongoMcpError::Validation(format!(
                "Collection name cannot contain '$' character: '{}'",
                name
            )));
        }

        if name.contains("..") || name.starts_with('.') || name.ends_with('.') {
            warn!(collection = name, "Collection name contains an unusual dot pattern");
        }

        Ok(Self {
            name: name.to_string(),
        })
    }

    /// Returns the validated collection name as a string slice
    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl AsRef<str> for ValidatedCollectionName {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for ValidatedCollectionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Require a non-empty field path (used by `distinct` and index specs)
pub fn require_field_name(field: &str, what: &str) -> Result<()> {
    if field.trim().is_empty() {
        return Err(MongoMcpError::Validation(format!("{} cannot be empty", what)));
    }
    if field.contains('\0') {
        return Err(MongoMcpError::Validation(format!(
            "{} cannot contain null bytes",
            what
        )));
    }
    Ok(())
}
