use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::error;
use regex::Regex;
use scraper::Selector;
use serde::Deserialize;

use crate::core::error::{LinkSureError, Result};
use crate::core::types::Link;
use crate::http::response::Response;

use super::result::ValidationResult;

/// Decides whether a link's fragment resolves inside a response body.
///
/// A link without a fragment is always valid. A fragment that cannot be
/// located yields an invalid result carrying the response's status code;
/// only selector parse faults are propagated as errors.
pub trait FragmentValidator: Send + Sync {
    fn validate(&self, link: &Link, response: &Response) -> Result<ValidationResult>;
}

/// Validator that accepts every fragment.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysValidFragmentValidator;

impl FragmentValidator for AlwaysValidFragmentValidator {
    fn validate(&self, link: &Link, response: &Response) -> Result<ValidationResult> {
        Ok(ValidationResult::valid(
            link.clone(),
            i32::from(response.status()),
        ))
    }
}

/// Default validator: locates the fragment in the body parsed as HTML.
///
/// Fragments containing `( ) , .` are illegal in CSS selector syntax (Javadoc
/// anchors like `#foo(int,long)`), so those are first looked up as raw
/// element ids. Everything else goes through a CSS selector query with an
/// `a[name="..."]` fallback for pre-HTML5 anchors.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlFragmentValidator;

impl HtmlFragmentValidator {
    fn has_selector_illegal_chars(fragment: &str) -> bool {
        fragment
            .chars()
            .any(|c| matches!(c, '(' | ')' | ',' | '.'))
    }
}

impl FragmentValidator for HtmlFragmentValidator {
    fn validate(&self, link: &Link, response: &Response) -> Result<ValidationResult> {
        let status = i32::from(response.status());
        let Some(fragment) = link.fragment() else {
            return Ok(ValidationResult::valid(link.clone(), status));
        };

        let doc = response.body_as_html()?;

        if Self::has_selector_illegal_chars(fragment) {
            let id = &fragment[1..];
            let any_id = Selector::parse("[id]").expect("constant selector");
            if doc.select(&any_id).any(|el| el.value().attr("id") == Some(id)) {
                return Ok(ValidationResult::valid(link.clone(), status));
            }
        }

        let selector = Selector::parse(fragment).map_err(|e| {
            error!(
                "Bad fragment: {} in URI {}: {}",
                fragment,
                link.original_uri(),
                e
            );
            LinkSureError::Selector(format!("Cannot parse {fragment}: {e}"))
        })?;

        let mut found = doc.select(&selector).next().is_some();
        if !found {
            let name_selector = format!("a[name=\"{}\"]", &fragment[1..]);
            let fallback = Selector::parse(&name_selector).map_err(|e| {
                error!(
                    "Bad fragment: {} in URI {}: {}",
                    fragment,
                    link.original_uri(),
                    e
                );
                LinkSureError::Selector(format!("Cannot parse {name_selector}: {e}"))
            })?;
            found = doc.select(&fallback).next().is_some();
        }

        if found {
            Ok(ValidationResult::valid(link.clone(), status))
        } else {
            Ok(ValidationResult::invalid(
                link.clone(),
                status,
                format!("Could not find {fragment}"),
            ))
        }
    }
}

/// Validator for GitHub blob API responses: JSON `{"content": <base64>}`.
///
/// Supports `#L<n>` and `#L<a>-L<b>` fragments checked against the decoded
/// file's line count.
#[derive(Debug)]
pub struct GitHubBlobFragmentValidator {
    line_pattern: Regex,
    lines_pattern: Regex,
}

#[derive(Deserialize)]
struct GitHubBlob {
    content: String,
}

/// Decoded form cached on the response: the line count of the blob.
struct BlobDocument {
    last_line_number: u64,
}

impl BlobDocument {
    fn has_line(&self, line: u64) -> bool {
        line > 0 && line <= self.last_line_number
    }

    fn has_interval(&self, start: u64, end: u64) -> bool {
        start > 0 && start <= end && end <= self.last_line_number
    }
}

impl Default for GitHubBlobFragmentValidator {
    fn default() -> Self {
        Self {
            line_pattern: Regex::new(r"^#L([0-9]+)$").expect("constant pattern"),
            lines_pattern: Regex::new(r"^#L([0-9]+)-L([0-9]+)$").expect("constant pattern"),
        }
    }
}

impl GitHubBlobFragmentValidator {
    pub fn new() -> Self {
        Self::default()
    }

    fn decode_blob(response: &Response) -> Result<BlobDocument> {
        let blob: GitHubBlob = serde_json::from_slice(response.body()).map_err(|e| {
            LinkSureError::Validation(format!("Could not parse GitHub blob body: {e}"))
        })?;
        // GitHub wraps the base64 payload in newlines
        let compact: String = blob.content.chars().filter(|c| !c.is_whitespace()).collect();
        let content = BASE64.decode(compact.as_bytes()).map_err(|e| {
            LinkSureError::Validation(format!("Could not decode GitHub blob content: {e}"))
        })?;
        let last_line_number = 1 + content.iter().filter(|&&b| b == b'\n').count() as u64;
        Ok(BlobDocument { last_line_number })
    }
}

impl FragmentValidator for GitHubBlobFragmentValidator {
    fn validate(&self, link: &Link, response: &Response) -> Result<ValidationResult> {
        let status = i32::from(response.status());
        let Some(fragment) = link.fragment() else {
            return Ok(ValidationResult::valid(link.clone(), status));
        };

        // A malformed body classifies the link as broken, it is not a fault
        // of the pipeline
        let text = match response.body_as(Self::decode_blob) {
            Ok(text) => text,
            Err(e) => {
                return Ok(ValidationResult::invalid(
                    link.clone(),
                    status,
                    e.to_string(),
                ))
            }
        };

        if let Some(captures) = self.line_pattern.captures(fragment) {
            let found = captures[1]
                .parse::<u64>()
                .map(|line| text.has_line(line))
                .unwrap_or(false);
            return Ok(if found {
                ValidationResult::valid(link.clone(), status)
            } else {
                ValidationResult::invalid(
                    link.clone(),
                    status,
                    format!("Fragment {fragment} not found"),
                )
            });
        }

        if let Some(captures) = self.lines_pattern.captures(fragment) {
            let found = match (captures[1].parse::<u64>(), captures[2].parse::<u64>()) {
                (Ok(start), Ok(end)) => text.has_interval(start, end),
                _ => false,
            };
            return Ok(if found {
                ValidationResult::valid(link.clone(), status)
            } else {
                ValidationResult::invalid(
                    link.clone(),
                    status,
                    format!("Fragment {fragment} not found"),
                )
            });
        }

        Ok(ValidationResult::invalid(
            link.clone(),
            status,
            format!("Fragment {fragment} not supported"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;

    fn html_response(body: &str) -> Response {
        Response::new(200, HeaderMap::new(), body.as_bytes().to_vec())
    }

    fn blob_response(line_count: u64) -> Response {
        let content = (1..=line_count)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let encoded = BASE64.encode(content.as_bytes());
        let body = serde_json::json!({ "content": encoded }).to_string();
        Response::new(200, HeaderMap::new(), body.into_bytes())
    }

    #[test]
    fn test_always_valid() {
        let validator = AlwaysValidFragmentValidator;
        let link = Link::of_resolved("https://example.com/page#whatever");
        let response = html_response("");

        let result = validator.validate(&link, &response).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.status(), 200);
    }

    #[test]
    fn test_html_no_fragment_is_valid() {
        let validator = HtmlFragmentValidator;
        let link = Link::of_resolved("https://example.com/page");
        let response = html_response("<html></html>");

        assert!(validator.validate(&link, &response).unwrap().is_valid());
    }

    #[test]
    fn test_html_fragment_found_by_id_selector() {
        let validator = HtmlFragmentValidator;
        let link = Link::of_resolved("https://example.com/page#x");
        let response = html_response(r#"<html><body><h2 id="x">Section</h2></body></html>"#);

        assert!(validator.validate(&link, &response).unwrap().is_valid());
    }

    #[test]
    fn test_html_fragment_found_by_anchor_name_fallback() {
        let validator = HtmlFragmentValidator;
        let link = Link::of_resolved("https://example.com/page#top");
        let response = html_response(r#"<html><body><a name="top"></a></body></html>"#);

        assert!(validator.validate(&link, &response).unwrap().is_valid());
    }

    #[test]
    fn test_html_javadoc_fragment_found_by_raw_id() {
        let validator = HtmlFragmentValidator;
        let link = Link::of_resolved("https://example.com/apidocs#foo(int,long)");
        let response =
            html_response(r#"<html><body><a id="foo(int,long)">foo</a></body></html>"#);

        assert!(validator.validate(&link, &response).unwrap().is_valid());
    }

    #[test]
    fn test_html_javadoc_fragment_missing_is_a_selector_fault() {
        let validator = HtmlFragmentValidator;
        let link = Link::of_resolved("https://example.com/apidocs#foo(int,long)");
        let response = html_response("<html><body></body></html>");

        let result = validator.validate(&link, &response);
        assert!(matches!(result, Err(LinkSureError::Selector(_))));
    }

    #[test]
    fn test_html_fragment_not_found() {
        let validator = HtmlFragmentValidator;
        let link = Link::of_resolved("https://example.com/page#missing");
        let response = html_response(r#"<html><body><h2 id="other">x</h2></body></html>"#);

        let result = validator.validate(&link, &response).unwrap();
        assert!(result.is_invalid());
        assert_eq!(result.message(), Some("Could not find #missing"));
    }

    #[test]
    fn test_github_line_bounds() {
        let validator = GitHubBlobFragmentValidator::new();
        let response = blob_response(42);

        let valid = Link::of_resolved("https://api.github.test/blob#L42");
        assert!(validator.validate(&valid, &response).unwrap().is_valid());

        let past_end = Link::of_resolved("https://api.github.test/blob#L43");
        let result = validator.validate(&past_end, &response).unwrap();
        assert!(result.is_invalid());
        assert_eq!(result.message(), Some("Fragment #L43 not found"));
    }

    #[test]
    fn test_github_interval_bounds() {
        let validator = GitHubBlobFragmentValidator::new();
        let response = blob_response(42);

        let full = Link::of_resolved("https://api.github.test/blob#L1-L42");
        assert!(validator.validate(&full, &response).unwrap().is_valid());

        let inverted = Link::of_resolved("https://api.github.test/blob#L42-L1");
        assert!(validator.validate(&inverted, &response).unwrap().is_invalid());
    }

    #[test]
    fn test_github_hundred_line_blob() {
        let validator = GitHubBlobFragmentValidator::new();
        let response = blob_response(100);

        for fragment in ["#L50", "#L1-L100"] {
            let link = Link::of_resolved(format!("https://api.github.test/blob{fragment}"));
            assert!(
                validator.validate(&link, &response).unwrap().is_valid(),
                "{fragment} should be valid"
            );
        }
        for fragment in ["#L0", "#L1-L101"] {
            let link = Link::of_resolved(format!("https://api.github.test/blob{fragment}"));
            assert!(
                validator.validate(&link, &response).unwrap().is_invalid(),
                "{fragment} should be invalid"
            );
        }
    }

    #[test]
    fn test_github_unsupported_fragment() {
        let validator = GitHubBlobFragmentValidator::new();
        let response = blob_response(42);
        let link = Link::of_resolved("https://api.github.test/blob#Lfoo");

        let result = validator.validate(&link, &response).unwrap();
        assert!(result.is_invalid());
        assert_eq!(result.message(), Some("Fragment #Lfoo not supported"));
    }

    #[test]
    fn test_github_no_fragment_is_valid() {
        let validator = GitHubBlobFragmentValidator::new();
        let response = blob_response(1);
        let link = Link::of_resolved("https://api.github.test/blob");

        assert!(validator.validate(&link, &response).unwrap().is_valid());
    }

    #[test]
    fn test_github_malformed_body_is_link_invalid() {
        let validator = GitHubBlobFragmentValidator::new();
        let response = Response::new(200, HeaderMap::new(), b"not json".to_vec());
        let link = Link::of_resolved("https://api.github.test/blob#L1");

        let result = validator.validate(&link, &response).unwrap();
        assert!(result.is_invalid());
        assert!(result.message().unwrap().contains("GitHub blob"));
    }

    #[test]
    fn test_github_content_with_embedded_newlines_decodes() {
        let validator = GitHubBlobFragmentValidator::new();
        let content = "a\nb\nc";
        let mut encoded = BASE64.encode(content.as_bytes());
        encoded.insert(4, '\n');
        let body = serde_json::json!({ "content": encoded }).to_string();
        let response = Response::new(200, HeaderMap::new(), body.into_bytes());

        let link = Link::of_resolved("https://api.github.test/blob#L3");
        assert!(validator.validate(&link, &response).unwrap().is_valid());
    }
}
