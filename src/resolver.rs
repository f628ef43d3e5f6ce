use std::fmt;

use crate::core::types::Link;

/// Where a link was discovered in the documentation source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: Option<u64>,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.file, line),
            None => write!(f, "{}", self.file),
        }
    }
}

/// Maps validated links back to the documentation source tree.
///
/// Implemented by the site-building collaborator; the core only consumes it
/// for the "edit this page" exclusion and for pretty-printing error
/// locations.
pub trait ResourceResolver: Send + Sync {
    /// Whether the link points at an AsciiDoc source file (an
    /// "edit this page" link).
    fn is_asciidoc_source(&self, link: &Link) -> bool;

    /// The on-disk source location of the link, if the resolver can map it.
    ///
    /// The default implementation falls back to the location carried on the
    /// link itself.
    fn source_location(&self, link: &Link) -> Option<SourceLocation> {
        link.source_file().map(|file| SourceLocation {
            file: file.to_string(),
            line: link.source_line(),
        })
    }
}

/// Resolver for standalone use: classifies nothing as AsciiDoc source and
/// reports only the locations carried on the links themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopResolver;

impl ResourceResolver for NoopResolver {
    fn is_asciidoc_source(&self, _link: &Link) -> bool {
        false
    }
}
