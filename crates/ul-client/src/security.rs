//! Input validation for values that end up in Bulk API URLs and job bodies.
//!
//! Job ids and object names often come straight from the command line, so
//! they are checked before being spliced into a request path.
//!
//! ```rust
//! use ultraload_client::security::{names, url};
//!
//! assert!(names::is_safe_sobject_name("Custom_Object__c"));
//! assert!(url::is_valid_salesforce_id("7504x00000AbCdEAAZ"));
//! ```

/// Object and field name validation.
pub mod names {
    /// Validate that a field name contains only safe characters.
    ///
    /// Field names start with a letter and contain only ASCII alphanumerics
    /// and underscores (which covers the `__c` / `__r` suffixes).
    #[must_use]
    pub fn is_safe_field_name(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() => {
                chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
            }
            _ => false,
        }
    }

    /// Validate that an SObject name is safe.
    ///
    /// SObject names follow the same rules as field names.
    #[must_use]
    pub fn is_safe_sobject_name(name: &str) -> bool {
        is_safe_field_name(name)
    }
}

/// Identifier checks for values spliced into URL paths.
pub mod url {
    /// Validate that a Salesforce ID has the correct format: 15 or 18
    /// ASCII alphanumeric characters.
    #[must_use]
    pub fn is_valid_salesforce_id(id: &str) -> bool {
        let len = id.len();
        (len == 15 || len == 18) && id.chars().all(|c| c.is_ascii_alphanumeric())
    }
}
