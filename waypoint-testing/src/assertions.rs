// Test assertions

use crate::mock_router::MockResponse;
use serde::de::DeserializeOwned;

/// Assert response status
pub fn assert_status(response: &MockResponse, expected: u16) {
    let actual = response.status();
    assert_eq!(
        actual, expected,
        "Expected status {}, got {} ({:?})",
        expected, actual, response
    );
}

/// Assert a response header value
pub fn assert_header(response: &MockResponse, key: &str, expected: &str) {
    let actual = response.header(key);
    assert_eq!(
        actual.map(String::as_str),
        Some(expected),
        "Expected header '{}' to be '{}', got {:?}",
        key,
        expected,
        actual
    );
}

/// Assert the response body as text
pub fn assert_body(response: &MockResponse, expected: &str) {
    assert_eq!(response.body_string().as_deref(), Some(expected));
}

/// Assert JSON response
pub fn assert_json<T: DeserializeOwned + PartialEq + std::fmt::Debug>(
    response: &MockResponse,
    expected: &T,
) {
    let actual: T = response.body_json().expect("Failed to parse JSON response");
    assert_eq!(&actual, expected);
}
