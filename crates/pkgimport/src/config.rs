//! Import configuration

/// Options shared by a registry and its artifact source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    /// Artifact file extensions, tried in order
    pub extensions: Vec<String>,
    /// Whether legacy textual export data is accepted
    pub allow_legacy_text: bool,
    /// Maximum nesting of type definitions within one type
    pub max_type_depth: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            extensions: vec![".a".to_string(), ".o".to_string()],
            allow_legacy_text: true,
            max_type_depth: 512,
        }
    }
}

impl ImportConfig {
    /// Replace the artifact extension order
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Accept or reject legacy textual export data
    pub fn with_legacy_text(mut self, allow: bool) -> Self {
        self.allow_legacy_text = allow;
        self
    }

    /// Set the type nesting limit
    pub fn with_max_type_depth(mut self, depth: usize) -> Self {
        self.max_type_depth = depth;
        self
    }
}
