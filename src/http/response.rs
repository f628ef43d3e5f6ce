use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use reqwest::header::HeaderMap;
use rustc_hash::FxHashMap;
use scraper::Html;

use crate::core::error::Result;

/// An HTTP response captured for validation.
///
/// Carries the final status code after redirects, the response headers and
/// the raw body, plus a per-response cache of decoded body forms so that
/// fragment validation never re-parses the same body.
///
/// `Response` is owned by the sequential validation pipeline and is not
/// `Send`; it never crosses a suspension point.
pub struct Response {
    status: u16,
    headers: HeaderMap,
    body: Vec<u8>,
    decoded: RefCell<FxHashMap<TypeId, Rc<dyn Any>>>,
}

impl Response {
    pub fn new(status: u16, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
            decoded: RefCell::new(FxHashMap::default()),
        }
    }

    /// The final HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// All response headers; lookups are case-insensitive.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of the given header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The raw response body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body decoded as UTF-8, lossily.
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Decode the body into `T`, caching one decoded form per type per
    /// response. The decoder runs at most once; a decoder error fails this
    /// lookup and nothing is cached.
    pub fn body_as<T, F>(&self, decode: F) -> Result<Rc<T>>
    where
        T: 'static,
        F: FnOnce(&Response) -> Result<T>,
    {
        let key = TypeId::of::<T>();
        if let Some(cached) = self.decoded.borrow().get(&key) {
            let cached = Rc::clone(cached);
            return Ok(cached
                .downcast::<T>()
                .expect("decoded body cache is keyed by TypeId"));
        }
        let value = Rc::new(decode(self)?);
        self.decoded.borrow_mut().insert(key, value.clone());
        Ok(value)
    }

    /// The body parsed as an HTML document, memoized on this response.
    pub fn body_as_html(&self) -> Result<Rc<Html>> {
        self.body_as(|resp| Ok(Html::parse_document(&resp.body_text())))
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, RETRY_AFTER};
    use std::cell::Cell;

    fn response_with_body(body: &str) -> Response {
        Response::new(200, HeaderMap::new(), body.as_bytes().to_vec())
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("120"));
        let response = Response::new(429, headers, Vec::new());

        assert_eq!(response.header("retry-after"), Some("120"));
        assert_eq!(response.header("Retry-After"), Some("120"));
        assert_eq!(response.header("location"), None);
    }

    #[test]
    fn test_body_text_lossy() {
        let response = Response::new(200, HeaderMap::new(), vec![0x68, 0x69, 0xFF]);
        assert_eq!(response.body_text(), "hi\u{FFFD}");
    }

    #[test]
    fn test_body_as_decodes_once() {
        let response = response_with_body("one\ntwo\nthree");
        let calls = Cell::new(0);

        struct LineCount(usize);

        for _ in 0..3 {
            let decoded = response
                .body_as(|resp| {
                    calls.set(calls.get() + 1);
                    Ok(LineCount(resp.body_text().lines().count()))
                })
                .unwrap();
            assert_eq!(decoded.0, 3);
        }

        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_body_as_error_is_not_cached() {
        let response = response_with_body("{");
        let calls = Cell::new(0);

        struct Parsed;

        let first: Result<Rc<Parsed>> = response.body_as(|_| {
            calls.set(calls.get() + 1);
            Err(crate::core::error::LinkSureError::Config(
                "bad body".to_string(),
            ))
        });
        assert!(first.is_err());

        let second = response.body_as(|_| {
            calls.set(calls.get() + 1);
            Ok(Parsed)
        });
        assert!(second.is_ok());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_body_as_html_memoized() {
        let response = response_with_body(r#"<html><body><h2 id="x">X</h2></body></html>"#);

        let first = response.body_as_html().unwrap();
        let second = response.body_as_html().unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }
}
