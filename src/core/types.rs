use std::cmp::Ordering;
use std::fmt;

/// A link discovered in rendered documentation content.
///
/// Tracks both the URI as it appeared in the source (`original_uri`) and the
/// absolute URI it resolves to (`resolved_uri`), together with the optional
/// source location the link was discovered at, for reporting purposes.
///
/// The fragment, if any, is the portion of the resolved URI after `#`
/// including the leading `#`.
#[derive(Debug, Eq, Clone)]
pub struct Link {
    original_uri: String,
    resolved_uri: String,
    fragment: Option<String>,
    source_file: Option<String>,
    source_line: Option<u64>,
}

/// Builder for creating `Link` instances with validation.
#[derive(Debug, Default)]
pub struct LinkBuilder {
    original_uri: Option<String>,
    resolved_uri: Option<String>,
    source_file: Option<String>,
    source_line: Option<u64>,
}

/// Errors that can occur when building a `Link`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// Resolved URI is missing or empty
    MissingResolvedUri,
    /// Source line was given without a source file
    SourceLineWithoutFile,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingResolvedUri => write!(f, "Resolved URI is required and cannot be empty"),
            Self::SourceLineWithoutFile => {
                write!(f, "A source line requires a source file")
            }
        }
    }
}

impl std::error::Error for LinkError {}

impl Ord for Link {
    fn cmp(&self, other: &Self) -> Ordering {
        self.resolved_uri.cmp(&other.resolved_uri)
    }
}

impl PartialOrd for Link {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Link {
    fn eq(&self, other: &Self) -> bool {
        self.original_uri == other.original_uri && self.resolved_uri == other.resolved_uri
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.original_uri != self.resolved_uri {
            write!(f, "{} -> {}", self.original_uri, self.resolved_uri)
        } else {
            write!(f, "{}", self.resolved_uri)
        }
    }
}

impl Link {
    /// Create a `Link` from a discovered (original, resolved) URI pair.
    ///
    /// The fragment is derived from the resolved URI.
    pub fn new(original_uri: impl Into<String>, resolved_uri: impl Into<String>) -> Self {
        let resolved_uri = resolved_uri.into();
        let fragment = extract_fragment(&resolved_uri);
        Self {
            original_uri: original_uri.into(),
            resolved_uri,
            fragment,
            source_file: None,
            source_line: None,
        }
    }

    /// Create a `Link` from a resolved URI only; the original URI is the
    /// resolved one.
    pub fn of_resolved(resolved_uri: impl Into<String>) -> Self {
        let resolved_uri = resolved_uri.into();
        Self::new(resolved_uri.clone(), resolved_uri)
    }

    /// Attach the source location the link was discovered at.
    pub fn with_source(mut self, file: impl Into<String>, line: u64) -> Self {
        self.source_file = Some(file.into());
        self.source_line = Some(line);
        self
    }

    /// Create a builder for constructing `Link` instances.
    pub fn builder() -> LinkBuilder {
        LinkBuilder::default()
    }

    /// The URI as it appeared in the source content.
    pub fn original_uri(&self) -> &str {
        &self.original_uri
    }

    /// The absolute URI the link resolves to, including any fragment.
    pub fn resolved_uri(&self) -> &str {
        &self.resolved_uri
    }

    /// The fragment including the leading `#`, or `None`.
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// The resolved URI with the fragment stripped, suitable for issuing an
    /// HTTP request.
    pub fn request_uri(&self) -> &str {
        match self.resolved_uri.find('#') {
            Some(idx) => &self.resolved_uri[..idx],
            None => &self.resolved_uri,
        }
    }

    /// File the link was discovered in, if known.
    pub fn source_file(&self) -> Option<&str> {
        self.source_file.as_deref()
    }

    /// Line the link was discovered at, if known (1-indexed).
    pub fn source_line(&self) -> Option<u64> {
        self.source_line
    }
}

fn extract_fragment(uri: &str) -> Option<String> {
    uri.find('#').map(|idx| uri[idx..].to_string())
}

impl LinkBuilder {
    /// Set the original URI.
    pub fn original_uri<S: Into<String>>(mut self, uri: S) -> Self {
        self.original_uri = Some(uri.into());
        self
    }

    /// Set the resolved URI (required).
    pub fn resolved_uri<S: Into<String>>(mut self, uri: S) -> Self {
        self.resolved_uri = Some(uri.into());
        self
    }

    /// Set the file the link was discovered in.
    pub fn source_file<S: Into<String>>(mut self, file: S) -> Self {
        self.source_file = Some(file.into());
        self
    }

    /// Set the line the link was discovered at.
    pub fn source_line(mut self, line: u64) -> Self {
        self.source_line = Some(line);
        self
    }

    /// Build the `Link`, validating all required fields.
    pub fn build(self) -> Result<Link, LinkError> {
        let resolved_uri = match self.resolved_uri {
            Some(uri) if !uri.trim().is_empty() => uri.trim().to_string(),
            _ => return Err(LinkError::MissingResolvedUri),
        };
        if self.source_line.is_some() && self.source_file.is_none() {
            return Err(LinkError::SourceLineWithoutFile);
        }
        let original_uri = self
            .original_uri
            .map(|u| u.trim().to_string())
            .unwrap_or_else(|| resolved_uri.clone());
        let fragment = extract_fragment(&resolved_uri);
        Ok(Link {
            original_uri,
            resolved_uri,
            fragment,
            source_file: self.source_file,
            source_line: self.source_line,
        })
    }
}
