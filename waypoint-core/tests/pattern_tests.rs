//! Matching behavior of compiled route patterns

use std::collections::HashMap;
use waypoint_core::{PatternError, RoutePattern};

fn vars(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let pattern = RoutePattern::compile("GET", pattern).unwrap();
    let mut matcher = pattern.matcher("GET", path);
    if matcher.matches() {
        Some(matcher.into_vars())
    } else {
        None
    }
}

#[test]
fn test_variable_matches_one_segment() {
    let captured = vars("/users/:id", "/users/123").unwrap();
    assert_eq!(captured["id"], "123");

    assert!(vars("/users/:id", "/users/1/2").is_none());
    assert!(vars("/users/:id", "/users/").is_none());
}

#[test]
fn test_trailing_slash_is_significant() {
    assert!(vars("/users", "/users").is_some());
    assert!(vars("/users", "/users/").is_none());
    assert!(vars("/users/", "/users/").is_some());
}

#[test]
fn test_literals_are_case_sensitive() {
    assert!(vars("/Users", "/users").is_none());
}

#[test]
fn test_percent_escapes_are_not_decoded() {
    assert!(vars("/a%20b", "/a%20b").is_some());
    assert!(vars("/a%20b", "/a b").is_none());

    let captured = vars("/files/:name", "/files/a%2Fb").unwrap();
    assert_eq!(captured["name"], "a%2Fb");
}

#[test]
fn test_constrained_variable() {
    assert_eq!(vars("/users/:id{[0-9]+}", "/users/42").unwrap()["id"], "42");
    assert!(vars("/users/:id{[0-9]+}", "/users/4x").is_none());
    assert_eq!(vars("/users/{id:[0-9]+}", "/users/7").unwrap()["id"], "7");
}

#[test]
fn test_regex_may_span_segments() {
    let captured = vars("/files/:path{.+}", "/files/docs/2024/report.pdf").unwrap();
    assert_eq!(captured["path"], "docs/2024/report.pdf");
}

#[test]
fn test_wildcard_matches_exactly_one_segment() {
    assert!(vars("/a/*/c", "/a/x/c").is_some());
    assert!(vars("/a/*/c", "/a/x/y/c").is_none());
    assert!(vars("/a/*/c", "/a/c").is_none());
    assert!(vars("/a/*/c", "/a/x/c").unwrap().is_empty());
}

#[test]
fn test_catch_all_matches_the_rest() {
    assert!(vars("/static/**", "/static").is_some());
    assert!(vars("/static/**", "/static/css/site.css").is_some());
    assert!(vars("/static/**", "/staticx").is_none());
}

#[test]
fn test_first_occurrence_of_repeated_variable_wins() {
    let captured = vars("/:id/x/:id", "/1/x/2").unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured["id"], "1");
}

#[test]
fn test_any_method() {
    let pattern = RoutePattern::compile("*", "/health").unwrap();
    for method in ["GET", "post", "DELETE", "PROPFIND"] {
        assert!(pattern.matcher(method, "/health").matches(), "{}", method);
    }
    assert!(!pattern.matcher("GET", "/healthz").matches());
}

#[test]
fn test_method_is_case_insensitive() {
    let pattern = RoutePattern::compile("get", "/x").unwrap();
    assert!(pattern.matcher("GET", "/x").matches());
    assert!(pattern.matcher("Get", "/x").matches());
    assert!(!pattern.matcher("POST", "/x").matches());
}

#[test]
fn test_matcher_can_be_reused() {
    let pattern = RoutePattern::compile("GET", "/users/:id").unwrap();
    let mut matcher = pattern.matcher("GET", "/users/5");
    assert!(matcher.matches());
    assert!(matcher.matches());
    assert_eq!(matcher.vars()["id"], "5");
}

#[test]
fn test_compile_errors_name_the_pattern() {
    let err = RoutePattern::compile("GET", "/users/{id").unwrap_err();
    assert!(matches!(err, PatternError::UnterminatedVariable { position: 7, .. }));
    assert!(err.to_string().contains("/users/{id"));
}
