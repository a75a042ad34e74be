// Mock router: runs the real dispatch and filter chain without a listener

use crate::request::MockRequest;
use waypoint_core::{Error, HttpMethod, HttpRequest, HttpResponse, Router};
use std::sync::Arc;

/// Executes requests against a [`Router`] in-process.
#[derive(Clone)]
pub struct MockRouter {
    router: Arc<Router>,
}

impl MockRouter {
    pub fn new(router: Router) -> Self {
        Self {
            router: Arc::new(router),
        }
    }

    pub fn from_arc(router: Arc<Router>) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Execute a bare request. `path` may carry a query string.
    pub async fn execute(&self, method: HttpMethod, path: &str) -> MockResponse {
        self.execute_request(HttpRequest::new(method.as_str().to_string(), path.to_string()))
            .await
    }

    pub async fn get(&self, path: &str) -> MockResponse {
        self.execute(HttpMethod::GET, path).await
    }

    pub async fn delete(&self, path: &str) -> MockResponse {
        self.execute(HttpMethod::DELETE, path).await
    }

    /// Execute a request built with [`MockRequest`].
    pub async fn send(&self, request: MockRequest) -> MockResponse {
        self.execute_request(request.build()).await
    }

    pub async fn execute_request(&self, request: HttpRequest) -> MockResponse {
        match self.router.route(request).await {
            Ok(response) => MockResponse::Success(response),
            Err(error) => MockResponse::Error(error),
        }
    }
}

/// Outcome of a mock request.
#[derive(Debug)]
pub enum MockResponse {
    Success(HttpResponse),
    Error(Error),
}

impl MockResponse {
    /// Assert the response is successful
    pub fn assert_success(&self) -> &HttpResponse {
        match self {
            MockResponse::Success(response) => response,
            MockResponse::Error(error) => {
                panic!("Expected success response, got error: {:?}", error)
            }
        }
    }

    /// Assert the request failed
    pub fn assert_error(&self) -> &Error {
        match self {
            MockResponse::Error(error) => error,
            MockResponse::Success(response) => {
                panic!("Expected error, got response with status {}", response.status)
            }
        }
    }

    /// Assert no route handled the request
    pub fn assert_not_found(&self) {
        match self {
            MockResponse::Error(Error::RouteNotFound(_)) => {}
            other => panic!("Expected route not found, got {:?}", other),
        }
    }

    /// Status as the router's `handle` would report it
    pub fn status(&self) -> u16 {
        match self {
            MockResponse::Success(response) => response.status,
            MockResponse::Error(error) => error.status_code(),
        }
    }

    pub fn body_string(&self) -> Option<String> {
        match self {
            MockResponse::Success(response) => String::from_utf8(response.body.clone()).ok(),
            MockResponse::Error(_) => None,
        }
    }

    pub fn body_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, String> {
        match self {
            MockResponse::Success(response) => serde_json::from_slice(&response.body)
                .map_err(|e| format!("Deserialization error: {}", e)),
            MockResponse::Error(error) => Err(format!("{:?}", error)),
        }
    }

    pub fn header(&self, key: &str) -> Option<&String> {
        match self {
            MockResponse::Success(response) => response.headers.get(key),
            MockResponse::Error(_) => None,
        }
    }
}
