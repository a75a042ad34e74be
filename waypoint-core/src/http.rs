// HTTP request and response types handed to and produced by the dispatcher

use crate::binder::BoundArguments;
use crate::extensions::Extensions;
use crate::media::MediaType;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;

/// HTTP methods
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
}

impl HttpMethod {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "DELETE" => Some(HttpMethod::DELETE),
            "PATCH" => Some(HttpMethod::PATCH),
            "HEAD" => Some(HttpMethod::HEAD),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
        }
    }
}

/// Multi-valued parameters (query string, form body).
pub type MultiMap = HashMap<String, Vec<String>>;

/// HTTP request as decoded by the transport layer.
#[derive(Debug, Default)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    /// Raw captured path variables of the route currently executing
    pub path_params: HashMap<String, String>,
    pub query_params: MultiMap,
    pub form_params: MultiMap,
    /// Arguments bound from the current route's parameter definitions
    pub arguments: BoundArguments,
    pub extensions: Extensions,
}

impl HttpRequest {
    pub fn new(method: String, path: String) -> Self {
        Self {
            method,
            path,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Path without the query string.
    pub fn path_only(&self) -> &str {
        self.path.split_once('?').map(|(p, _)| p).unwrap_or(&self.path)
    }

    /// Get a raw path parameter by name
    pub fn param(&self, name: &str) -> Option<&String> {
        self.path_params.get(name)
    }

    /// Get a percent-decoded path parameter by name
    pub fn param_decoded(&self, name: &str) -> Option<Cow<'_, str>> {
        self.param(name).map(|raw| decode(raw))
    }

    /// First query value for a name
    pub fn query(&self, name: &str) -> Option<&String> {
        self.query_params.get(name).and_then(|values| values.first())
    }

    /// All query values for a name
    pub fn query_all(&self, name: &str) -> &[String] {
        self.query_params
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// First form value for a name
    pub fn form(&self, name: &str) -> Option<&String> {
        self.form_params.get(name).and_then(|values| values.first())
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<MediaType> {
        self.header("Content-Type").and_then(MediaType::parse)
    }

    /// Parsed `Accept` header, most preferred first. Empty when absent.
    pub fn accept(&self) -> Vec<MediaType> {
        self.header("Accept")
            .map(MediaType::parse_accept)
            .unwrap_or_default()
    }

    /// Parse the request body as JSON
    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// Parse `a=1&b=2&a=3` into a multi-valued map, decoding keys and values.
pub fn parse_pairs(input: &str) -> Result<MultiMap, Error> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(input)
        .map_err(|e| Error::BadRequest(format!("Failed to parse parameters: {}", e)))?;

    let mut map = MultiMap::new();
    for (key, value) in pairs {
        map.entry(key).or_default().push(value);
    }
    Ok(map)
}

/// Percent-decode a path value, falling back to the raw text when it is not valid UTF-8.
pub fn decode(raw: &str) -> Cow<'_, str> {
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}

/// HTTP response wrapper
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn created() -> Self {
        Self::new(201)
    }

    pub fn no_content() -> Self {
        Self::new(204)
    }

    pub fn bad_request() -> Self {
        Self::new(400)
    }

    pub fn not_found() -> Self {
        Self::new(404)
    }

    pub fn internal_server_error() -> Self {
        Self::new(500)
    }

    /// Plain text response
    pub fn text(body: impl Into<String>) -> Self {
        Self::ok()
            .with_header("Content-Type", "text/plain; charset=utf-8")
            .with_body(body.into().into_bytes())
    }

    /// Response describing an error, status taken from the error
    pub fn from_error(error: &Error) -> Self {
        Self::new(error.status_code())
            .with_header("Content-Type", "text/plain; charset=utf-8")
            .with_body(error.to_string().into_bytes())
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self, Error> {
        self.body = serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))?;
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Body as UTF-8 text (lossy)
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_round_trip() {
        for method in ["get", "POST", "Put", "delete", "PATCH", "head", "OPTIONS"] {
            let parsed = HttpMethod::from_str(method).unwrap();
            assert_eq!(parsed.as_str(), method.to_uppercase());
        }
        assert_eq!(HttpMethod::from_str("BREW"), None);
    }

    #[test]
    fn test_parse_pairs_multi_valued() {
        let params = parse_pairs("tag=rust&tag=web&name=john%20doe").unwrap();
        assert_eq!(params["tag"], vec!["rust", "web"]);
        assert_eq!(params["name"], vec!["john doe"]);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = HttpRequest::new("GET".to_string(), "/".to_string())
            .with_header("content-type", "application/json");
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        assert_eq!(req.content_type(), Some(MediaType::json()));
    }

    #[test]
    fn test_accept_defaults_to_empty() {
        let req = HttpRequest::new("GET".to_string(), "/".to_string());
        assert!(req.accept().is_empty());
    }

    #[test]
    fn test_param_decoded() {
        let mut req = HttpRequest::new("GET".to_string(), "/".to_string());
        req.path_params
            .insert("id".to_string(), "x%252Fy".to_string());
        assert_eq!(req.param("id").unwrap(), "x%252Fy");
        assert_eq!(req.param_decoded("id").unwrap(), "x%2Fy");
    }

    #[test]
    fn test_path_only() {
        let req = HttpRequest::new("GET".to_string(), "/search?q=rust".to_string());
        assert_eq!(req.path_only(), "/search");
    }

    #[test]
    fn test_response_from_error() {
        let response = HttpResponse::from_error(&Error::RouteNotFound("GET /x".to_string()));
        assert_eq!(response.status, 404);
        assert_eq!(response.body_string(), "Route not found: GET /x");
    }
}
