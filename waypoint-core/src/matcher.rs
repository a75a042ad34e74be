//! Per-request route matching.

use crate::pattern::RoutePattern;
use std::collections::HashMap;

/// Matches one request against one [`RoutePattern`].
///
/// Created per dispatch attempt and dropped right after. Captured values are
/// returned exactly as they appear in the path; percent decoding is left to
/// the caller.
#[derive(Debug)]
pub struct RouteMatcher<'p> {
    pattern: &'p RoutePattern,
    subject: String,
    vars: HashMap<String, String>,
}

impl<'p> RouteMatcher<'p> {
    pub(crate) fn new(pattern: &'p RoutePattern, method: &str, path: &str) -> Self {
        let method = method.trim().to_uppercase();
        let mut subject = String::with_capacity(method.len() + path.len() + 1);
        subject.push_str(&method);
        if !path.starts_with('/') {
            subject.push('/');
        }
        subject.push_str(path);

        Self {
            pattern,
            subject,
            vars: HashMap::new(),
        }
    }

    /// Test the request and capture variables on success.
    pub fn matches(&mut self) -> bool {
        self.vars.clear();
        let Some(captures) = self.pattern.regex().captures(&self.subject) else {
            return false;
        };

        for (group, name) in self.pattern.groups() {
            if self.vars.contains_key(name) {
                continue;
            }
            if let Some(value) = captures.name(group) {
                self.vars.insert(name.clone(), value.as_str().to_string());
            }
        }
        true
    }

    /// Captured variables; empty until `matches()` returned `true`.
    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }

    /// Consume the matcher, keeping the captured variables.
    pub fn into_vars(self) -> HashMap<String, String> {
        self.vars
    }

    pub fn pattern(&self) -> &RoutePattern {
        self.pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher_for<'p>(pattern: &'p RoutePattern, path: &str) -> RouteMatcher<'p> {
        pattern.matcher("GET", path)
    }

    #[test]
    fn test_vars_empty_before_match() {
        let pattern = RoutePattern::compile("GET", "/users/:id").unwrap();
        let matcher = matcher_for(&pattern, "/users/7");
        assert!(matcher.vars().is_empty());
    }

    #[test]
    fn test_simple_variable() {
        let pattern = RoutePattern::compile("GET", "/users/:id").unwrap();
        let mut matcher = matcher_for(&pattern, "/users/abc-123");
        assert!(matcher.matches());
        assert_eq!(matcher.vars().get("id"), Some(&"abc-123".to_string()));
    }

    #[test]
    fn test_variable_rejects_embedded_slash() {
        let pattern = RoutePattern::compile("GET", "/user/:id").unwrap();
        assert!(!matcher_for(&pattern, "/user/123/x").matches());
    }

    #[test]
    fn test_variable_keeps_encoded_text() {
        let pattern = RoutePattern::compile("GET", "/user/:id").unwrap();
        let mut matcher = matcher_for(&pattern, "/user/x%252Fy%252Fz");
        assert!(matcher.matches());
        assert_eq!(matcher.vars()["id"], "x%252Fy%252Fz");
    }

    #[test]
    fn test_regex_boundaries() {
        let pattern = RoutePattern::compile("GET", r"/v/:var{\d{4,7}}").unwrap();
        assert!(matcher_for(&pattern, "/v/1234").matches());
        assert!(matcher_for(&pattern, "/v/1234567").matches());
        assert!(!matcher_for(&pattern, "/v/123").matches());
        assert!(!matcher_for(&pattern, "/v/12345678").matches());
    }

    #[test]
    fn test_regex_variable_spanning_segments() {
        let pattern = RoutePattern::compile("GET", "/docs/:path{.+}").unwrap();
        let mut matcher = matcher_for(&pattern, "/docs/guide/intro.md");
        assert!(matcher.matches());
        assert_eq!(matcher.vars()["path"], "guide/intro.md");
    }

    #[test]
    fn test_method_must_match() {
        let pattern = RoutePattern::compile("POST", "/users").unwrap();
        assert!(!pattern.matcher("GET", "/users").matches());
        assert!(pattern.matcher("post", "/users").matches());
    }

    #[test]
    fn test_any_method() {
        let pattern = RoutePattern::compile("*", "/users").unwrap();
        assert!(pattern.matcher("GET", "/users").matches());
        assert!(pattern.matcher("DELETE", "/users").matches());
    }

    #[test]
    fn test_single_wildcard() {
        let pattern = RoutePattern::compile("GET", "/*").unwrap();
        assert!(matcher_for(&pattern, "/anything").matches());
        assert!(!matcher_for(&pattern, "/a/b").matches());
        assert!(!matcher_for(&pattern, "/").matches());
    }

    #[test]
    fn test_catch_all() {
        let pattern = RoutePattern::compile("GET", "/files/**").unwrap();
        assert!(matcher_for(&pattern, "/files").matches());
        assert!(matcher_for(&pattern, "/files/").matches());
        assert!(matcher_for(&pattern, "/files/a/b/c.txt").matches());
        assert!(!matcher_for(&pattern, "/filesystem").matches());
    }

    #[test]
    fn test_literal_is_case_sensitive_and_undecoded() {
        let pattern = RoutePattern::compile("GET", "/a%20b/Users").unwrap();
        assert!(matcher_for(&pattern, "/a%20b/Users").matches());
        assert!(!matcher_for(&pattern, "/a b/Users").matches());
        assert!(!matcher_for(&pattern, "/a%20b/users").matches());
    }

    #[test]
    fn test_duplicate_variable_first_wins() {
        let pattern = RoutePattern::compile("GET", "/:id/x/:id").unwrap();
        let mut matcher = matcher_for(&pattern, "/first/x/second");
        assert!(matcher.matches());
        assert_eq!(matcher.vars()["id"], "first");
    }

    #[test]
    fn test_failed_match_clears_vars() {
        let pattern = RoutePattern::compile("GET", "/users/:id").unwrap();
        let mut matcher = matcher_for(&pattern, "/users/1");
        assert!(matcher.matches());
        matcher.subject = "GET/nope".to_string();
        assert!(!matcher.matches());
        assert!(matcher.vars().is_empty());
    }

    #[test]
    fn test_skeleton_matches_sample_values() {
        let patterns = [
            ("/users/:id", "/users/1"),
            ("/users/:id/posts/:post", "/users/1/posts/2"),
            ("/a/*/c", "/a/b/c"),
            ("/static/**", "/static/css/site.css"),
            ("/n/:n{[0-9]+}", "/n/99"),
        ];
        for (raw, path) in patterns {
            let pattern = RoutePattern::compile("GET", raw).unwrap();
            assert!(matcher_for(&pattern, path).matches(), "{} vs {}", raw, path);
        }
    }

    #[test]
    fn test_path_without_leading_slash() {
        let pattern = RoutePattern::compile("GET", "/users").unwrap();
        assert!(matcher_for(&pattern, "users").matches());
    }
}
