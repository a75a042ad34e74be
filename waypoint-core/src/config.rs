//! Router configuration

use serde::{Deserialize, Serialize};

/// Behavior switches for dispatch and binding.
///
/// Embeddable in an application's own configuration file; every field has a
/// default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Percent-decode captured path variables before binding them
    #[serde(default = "default_true")]
    pub decode_path_variables: bool,
    /// Reject request names that match no bean member instead of skipping them
    #[serde(default)]
    pub strict_bean_binding: bool,
    /// Parse `application/x-www-form-urlencoded` bodies into form parameters
    #[serde(default = "default_true")]
    pub parse_form_bodies: bool,
    /// Largest list index a bean path from a request may address
    #[serde(default = "default_max_list_index")]
    pub max_list_index: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_list_index() -> usize {
    1024
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            decode_path_variables: default_true(),
            strict_bean_binding: false,
            parse_form_bodies: default_true(),
            max_list_index: default_max_list_index(),
        }
    }
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable percent decoding of path variables
    pub fn with_decode_path_variables(mut self, enable: bool) -> Self {
        self.decode_path_variables = enable;
        self
    }

    /// Enable or disable strict bean binding
    pub fn with_strict_bean_binding(mut self, enable: bool) -> Self {
        self.strict_bean_binding = enable;
        self
    }

    /// Enable or disable form body parsing
    pub fn with_parse_form_bodies(mut self, enable: bool) -> Self {
        self.parse_form_bodies = enable;
        self
    }

    /// Set the largest list index accepted from request names
    pub fn with_max_list_index(mut self, limit: usize) -> Self {
        self.max_list_index = limit;
        self
    }
}
