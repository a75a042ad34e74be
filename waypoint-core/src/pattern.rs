//! Route pattern compiler
//!
//! A pattern is a `/`-separated template made of whole-segment tokens:
//!
//! - literal text, matched exactly (case-sensitive, percent escapes untouched)
//! - `:name` or `{name}`: one path segment, `[^/]+`
//! - `:name{regex}` or `{name:regex}`: an inline regex, which may span segments
//! - `*`: exactly one segment, not captured
//! - `**`: the rest of the path including `/`, only as the last segment
//!
//! Method and path compile into one anchored regex (`^GET/users/(?P<..>[^/]+)$`)
//! so a [`RouteMatcher`] matches and captures in a single pass.
//!
//! # Examples
//!
//! ```
//! use waypoint_core::RoutePattern;
//!
//! let pattern = RoutePattern::compile("GET", "/users/:id{[0-9]+}").unwrap();
//! let mut matcher = pattern.matcher("GET", "/users/42");
//! assert!(matcher.matches());
//! assert_eq!(matcher.vars().get("id").map(String::as_str), Some("42"));
//! ```

use crate::error::PatternError;
use crate::matcher::RouteMatcher;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;

/// Method token matching every HTTP verb.
pub const ANY_METHOD: &str = "*";

const GROUP_PREFIX: &str = "__wp";

/// A compiled pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text
    Literal(String),
    /// `:name`
    Variable(String),
    /// `:name{regex}`
    Constrained { name: String, regex: String },
    /// `*`
    Wildcard,
    /// `**`
    CatchAll,
}

impl Segment {
    /// Variable name captured by this segment, if any.
    pub fn variable(&self) -> Option<&str> {
        match self {
            Segment::Variable(name) | Segment::Constrained { name, .. } => Some(name),
            _ => None,
        }
    }

    fn is_dynamic(&self) -> bool {
        !matches!(self, Segment::Literal(_))
    }
}

/// An immutable, compiled route pattern.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    method: String,
    pattern: String,
    segments: Vec<Segment>,
    variables: Vec<String>,
    /// Capture group name per variable occurrence, in pattern order
    groups: Vec<(String, String)>,
    regex: Regex,
}

impl RoutePattern {
    /// Compile a method and a path pattern.
    pub fn compile(method: &str, pattern: &str) -> Result<Self, PatternError> {
        let method = method.trim().to_uppercase();
        if method.is_empty() || method.contains('/') {
            return Err(invalid(pattern, "method must be a verb or '*'"));
        }
        if !pattern.starts_with('/') {
            return Err(invalid(pattern, "pattern must start with '/'"));
        }

        let raw_segments = split_segments(pattern)?;
        let mut segments = Vec::with_capacity(raw_segments.len());
        for (index, raw) in raw_segments.iter().enumerate() {
            let segment = parse_segment(pattern, raw)?;
            if segment == Segment::CatchAll && index + 1 != raw_segments.len() {
                return Err(PatternError::MisplacedWildcard {
                    pattern: pattern.to_string(),
                });
            }
            segments.push(segment);
        }

        let mut source = String::from("^");
        if method == ANY_METHOD {
            source.push_str("[^/]+");
        } else {
            source.push_str(&regex::escape(&method));
        }
        if segments.is_empty() {
            source.push('/');
        }

        let mut variables: Vec<String> = Vec::new();
        let mut groups = Vec::new();
        for segment in &segments {
            let (name, body) = match segment {
                Segment::CatchAll => {
                    source.push_str("(?:/.*)?");
                    continue;
                }
                Segment::Literal(text) => {
                    source.push('/');
                    source.push_str(&regex::escape(text));
                    continue;
                }
                Segment::Wildcard => {
                    source.push_str("/[^/]+");
                    continue;
                }
                Segment::Variable(name) => (name, "[^/]+"),
                Segment::Constrained { name, regex } => (name, regex.as_str()),
            };
            let group = format!("{}{}", GROUP_PREFIX, groups.len());
            source.push_str(&format!("/(?P<{}>{})", group, body));
            if !variables.contains(name) {
                variables.push(name.clone());
            }
            groups.push((group, name.clone()));
        }
        source.push('$');

        // Each inline regex compiled on its own; a failure here comes from
        // combining them and belongs to the pattern as a whole.
        let regex = Regex::new(&source).map_err(|e| invalid(pattern, &e.to_string()))?;

        Ok(Self {
            method,
            pattern: pattern.to_string(),
            segments,
            variables,
            groups,
            regex,
        })
    }

    /// The HTTP method, upper-cased, or `*`.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The raw pattern string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Variable names in order of first occurrence.
    pub fn variable_names(&self) -> &[String] {
        &self.variables
    }

    /// True when the pattern has no variables or wildcards.
    pub fn is_static(&self) -> bool {
        !self.segments.iter().any(Segment::is_dynamic)
    }

    /// Create a matcher for one request.
    pub fn matcher(&self, method: &str, path: &str) -> RouteMatcher<'_> {
        RouteMatcher::new(self, method, path)
    }

    pub(crate) fn regex(&self) -> &Regex {
        &self.regex
    }

    pub(crate) fn groups(&self) -> &[(String, String)] {
        &self.groups
    }

    /// Build a concrete path from variable values.
    ///
    /// Wildcards are filled from the `*` and `**` keys; `**` may be omitted.
    pub fn reverse(&self, vars: &HashMap<String, String>) -> Result<String, PatternError> {
        let mut path = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => {
                    path.push('/');
                    path.push_str(text);
                }
                Segment::Variable(name) => {
                    let value = self.lookup(vars, name)?;
                    if value.contains('/') {
                        return Err(invalid(&self.pattern, "segment value contains '/'"));
                    }
                    path.push('/');
                    path.push_str(value);
                }
                Segment::Constrained { name, regex } => {
                    let value = self.lookup(vars, name)?;
                    let anchored = Regex::new(&format!("^(?:{})$", regex)).map_err(|e| {
                        PatternError::InvalidRegex {
                            pattern: self.pattern.clone(),
                            name: name.clone(),
                            reason: e.to_string(),
                        }
                    })?;
                    if !anchored.is_match(value) {
                        return Err(invalid(
                            &self.pattern,
                            &format!("'{}' does not satisfy variable '{}'", value, name),
                        ));
                    }
                    path.push('/');
                    path.push_str(value);
                }
                Segment::Wildcard => {
                    path.push('/');
                    path.push_str(self.lookup(vars, "*")?);
                }
                Segment::CatchAll => {
                    if let Some(rest) = vars.get("**").filter(|rest| !rest.is_empty()) {
                        path.push('/');
                        path.push_str(rest.trim_start_matches('/'));
                    }
                }
            }
        }
        if path.is_empty() {
            path.push('/');
        }
        Ok(path)
    }

    fn lookup<'a>(
        &self,
        vars: &'a HashMap<String, String>,
        name: &str,
    ) -> Result<&'a str, PatternError> {
        vars.get(name)
            .map(String::as_str)
            .ok_or_else(|| PatternError::MissingVariable {
                pattern: self.pattern.clone(),
                name: name.to_string(),
            })
    }
}

impl PartialEq for RoutePattern {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method && self.segments == other.segments
    }
}

impl Eq for RoutePattern {}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.pattern)
    }
}

fn invalid(pattern: &str, reason: &str) -> PatternError {
    PatternError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    }
}

/// Split on `/` outside of `{...}` so inline regexes may contain slashes and braces.
fn split_segments(pattern: &str) -> Result<Vec<&str>, PatternError> {
    if pattern == "/" {
        return Ok(Vec::new());
    }

    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut opened_at = 0usize;
    let mut escaped = false;
    let mut start = 1;

    for (i, c) in pattern.char_indices().skip(1) {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if depth > 0 => escaped = true,
            '{' => {
                if depth == 0 {
                    opened_at = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => depth -= 1,
            '/' if depth == 0 => {
                segments.push(&pattern[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if depth > 0 {
        return Err(PatternError::UnterminatedVariable {
            pattern: pattern.to_string(),
            position: opened_at,
        });
    }
    segments.push(&pattern[start..]);
    Ok(segments)
}

fn parse_segment(pattern: &str, raw: &str) -> Result<Segment, PatternError> {
    match raw {
        "*" => return Ok(Segment::Wildcard),
        "**" => return Ok(Segment::CatchAll),
        _ => {}
    }

    if let Some(rest) = raw.strip_prefix(':') {
        return match rest.find('{') {
            None => variable(pattern, rest, None),
            Some(open) => {
                let regex = rest[open + 1..].strip_suffix('}').ok_or_else(|| {
                    invalid(pattern, "text after a variable regex is not supported")
                })?;
                variable(pattern, &rest[..open], Some(regex))
            }
        };
    }

    if let Some(inner) = raw.strip_prefix('{') {
        let inner = inner
            .strip_suffix('}')
            .ok_or_else(|| invalid(pattern, "variables must span a whole segment"))?;
        return match inner.split_once(':') {
            Some((name, regex)) => variable(pattern, name, Some(regex)),
            None => variable(pattern, inner, None),
        };
    }

    if raw.contains('{') {
        return Err(invalid(pattern, "variables must span a whole segment"));
    }
    Ok(Segment::Literal(raw.to_string()))
}

fn variable(pattern: &str, name: &str, regex: Option<&str>) -> Result<Segment, PatternError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if !valid {
        return Err(PatternError::InvalidVariableName {
            pattern: pattern.to_string(),
            name: name.to_string(),
        });
    }

    match regex {
        None => Ok(Segment::Variable(name.to_string())),
        Some(regex) => {
            if regex.is_empty() {
                return Err(PatternError::InvalidRegex {
                    pattern: pattern.to_string(),
                    name: name.to_string(),
                    reason: "empty regex".to_string(),
                });
            }
            Regex::new(regex).map_err(|e| PatternError::InvalidRegex {
                pattern: pattern.to_string(),
                name: name.to_string(),
                reason: e.to_string(),
            })?;
            Ok(Segment::Constrained {
                name: name.to_string(),
                regex: regex.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_static() {
        let pattern = RoutePattern::compile("get", "/api/v1/users").unwrap();
        assert_eq!(pattern.method(), "GET");
        assert!(pattern.is_static());
        assert_eq!(
            pattern.segments(),
            &[
                Segment::Literal("api".to_string()),
                Segment::Literal("v1".to_string()),
                Segment::Literal("users".to_string()),
            ]
        );
    }

    #[test]
    fn test_compile_root() {
        let pattern = RoutePattern::compile("GET", "/").unwrap();
        assert!(pattern.segments().is_empty());
        assert!(pattern.matcher("GET", "/").matches());
        assert!(!pattern.matcher("GET", "/x").matches());
    }

    #[test]
    fn test_compile_variables() {
        let pattern = RoutePattern::compile("GET", "/users/:id/posts/{post}").unwrap();
        assert_eq!(pattern.variable_names(), &["id", "post"]);
        assert!(!pattern.is_static());
    }

    #[test]
    fn test_compile_nested_braces_in_regex() {
        let pattern = RoutePattern::compile("GET", r"/v/:var{\d{4,7}}").unwrap();
        assert_eq!(
            pattern.segments(),
            &[
                Segment::Literal("v".to_string()),
                Segment::Constrained {
                    name: "var".to_string(),
                    regex: r"\d{4,7}".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_brace_and_colon_spellings_are_equal() {
        let a = RoutePattern::compile("GET", "/users/:id{[0-9]+}").unwrap();
        let b = RoutePattern::compile("GET", "/users/{id:[0-9]+}").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_same_pattern_compiles_equal() {
        let a = RoutePattern::compile("GET", "/a/:b/*/**").unwrap();
        let b = RoutePattern::compile("GET", "/a/:b/*/**").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, RoutePattern::compile("POST", "/a/:b/*/**").unwrap());
    }

    #[test]
    fn test_unterminated_variable() {
        let err = RoutePattern::compile("GET", "/users/:id{[0-9]+").unwrap_err();
        assert!(matches!(err, PatternError::UnterminatedVariable { position: 10, .. }));
    }

    #[test]
    fn test_invalid_regex() {
        let err = RoutePattern::compile("GET", "/users/:id{[0-9+}").unwrap_err();
        assert!(matches!(err, PatternError::InvalidRegex { ref name, .. } if name == "id"));
    }

    #[test]
    fn test_conflicting_inline_groups_blame_the_pattern() {
        let err = RoutePattern::compile("GET", "/a/:x{(?P<g>a)}/:y{(?P<g>b)}").unwrap_err();
        assert!(matches!(
            err,
            PatternError::InvalidPattern { ref pattern, .. } if pattern.starts_with("/a/")
        ));
    }

    #[test]
    fn test_catch_all_must_be_last() {
        let err = RoutePattern::compile("GET", "/files/**/meta").unwrap_err();
        assert!(matches!(err, PatternError::MisplacedWildcard { .. }));
    }

    #[test]
    fn test_invalid_variable_names() {
        assert!(matches!(
            RoutePattern::compile("GET", "/users/:").unwrap_err(),
            PatternError::InvalidVariableName { .. }
        ));
        assert!(matches!(
            RoutePattern::compile("GET", "/users/:1id").unwrap_err(),
            PatternError::InvalidVariableName { .. }
        ));
    }

    #[test]
    fn test_pattern_must_be_absolute() {
        assert!(matches!(
            RoutePattern::compile("GET", "users").unwrap_err(),
            PatternError::InvalidPattern { .. }
        ));
    }

    #[test]
    fn test_partial_segment_variables_rejected() {
        assert!(RoutePattern::compile("GET", "/file-{id}").is_err());
        assert!(RoutePattern::compile("GET", "/:id{[0-9]+}.json").is_err());
    }

    #[test]
    fn test_duplicate_variable_names_listed_once() {
        let pattern = RoutePattern::compile("GET", "/:id/x/:id").unwrap();
        assert_eq!(pattern.variable_names(), &["id"]);
    }

    #[test]
    fn test_display() {
        let pattern = RoutePattern::compile("post", "/users").unwrap();
        assert_eq!(pattern.to_string(), "POST /users");
    }

    #[test]
    fn test_reverse() {
        let pattern = RoutePattern::compile("GET", "/users/:id{[0-9]+}/files/**").unwrap();
        let mut vars = HashMap::new();
        vars.insert("id".to_string(), "42".to_string());
        assert_eq!(pattern.reverse(&vars).unwrap(), "/users/42/files");

        vars.insert("**".to_string(), "a/b.txt".to_string());
        assert_eq!(pattern.reverse(&vars).unwrap(), "/users/42/files/a/b.txt");

        vars.insert("id".to_string(), "abc".to_string());
        assert!(pattern.reverse(&vars).is_err());
    }

    #[test]
    fn test_reverse_missing_variable() {
        let pattern = RoutePattern::compile("GET", "/users/:id").unwrap();
        let err = pattern.reverse(&HashMap::new()).unwrap_err();
        assert!(matches!(err, PatternError::MissingVariable { ref name, .. } if name == "id"));
    }
}
