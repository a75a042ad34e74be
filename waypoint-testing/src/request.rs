// Builder for requests executed by the mock router

use std::collections::HashMap;
use waypoint_core::{Error, Extensions, HttpMethod, HttpRequest};

/// Builds an [`HttpRequest`] the way a transport layer would hand it over.
#[derive(Debug)]
pub struct MockRequest {
    method: HttpMethod,
    path: String,
    headers: HashMap<String, String>,
    query: Vec<(String, String)>,
    form: Vec<(String, String)>,
    body: Vec<u8>,
    extensions: Extensions,
}

impl MockRequest {
    pub fn new(method: HttpMethod, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            headers: HashMap::new(),
            query: Vec::new(),
            form: Vec::new(),
            body: Vec::new(),
            extensions: Extensions::new(),
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(HttpMethod::GET, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(HttpMethod::POST, path)
    }

    pub fn put(path: &str) -> Self {
        Self::new(HttpMethod::PUT, path)
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    pub fn content_type(self, value: &str) -> Self {
        self.header("Content-Type", value)
    }

    pub fn accept(self, value: &str) -> Self {
        self.header("Accept", value)
    }

    /// Append a query parameter; repeated keys are kept.
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Append a form field. The body is encoded as
    /// `application/x-www-form-urlencoded` when the request is built.
    pub fn form(mut self, key: &str, value: &str) -> Self {
        self.form.push((key.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Set JSON body
    pub fn json<T: serde::Serialize>(mut self, data: &T) -> Result<Self, Error> {
        self.body = serde_json::to_vec(data).map_err(|e| Error::Serialization(e.to_string()))?;
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    /// Make a typed value available to injected parameters.
    pub fn extension<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }

    pub fn build(self) -> HttpRequest {
        let mut path = self.path;
        if !self.query.is_empty() {
            let encoded = serde_urlencoded::to_string(&self.query).unwrap_or_default();
            path.push(if path.contains('?') { '&' } else { '?' });
            path.push_str(&encoded);
        }

        let mut headers = self.headers;
        let mut body = self.body;
        if !self.form.is_empty() {
            body = serde_urlencoded::to_string(&self.form)
                .unwrap_or_default()
                .into_bytes();
            if !headers.keys().any(|k| k.eq_ignore_ascii_case("Content-Type")) {
                headers.insert(
                    "Content-Type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                );
            }
        }

        let mut request = HttpRequest::new(self.method.as_str().to_string(), path);
        request.headers = headers;
        request.body = body;
        request.extensions = self.extensions;
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_is_appended() {
        let request = MockRequest::get("/search?page=1")
            .query("q", "rust web")
            .query("tag", "a")
            .build();
        assert_eq!(request.path, "/search?page=1&q=rust+web&tag=a");
    }

    #[test]
    fn test_form_sets_body_and_content_type() {
        let request = MockRequest::post("/people")
            .form("name", "Ada")
            .form("address.city", "London")
            .build();
        assert_eq!(
            request.header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(
            String::from_utf8(request.body).unwrap(),
            "name=Ada&address.city=London"
        );
    }

    #[test]
    fn test_json_body() {
        let request = MockRequest::post("/items")
            .json(&serde_json::json!({"title": "x"}))
            .unwrap()
            .build();
        assert_eq!(request.header("Content-Type"), Some("application/json"));
        assert_eq!(request.body, br#"{"title":"x"}"#.to_vec());
    }

    #[test]
    fn test_extension() {
        let request = MockRequest::get("/").extension(7u32).build();
        assert_eq!(request.extensions.get::<u32>(), Some(&7));
    }
}
