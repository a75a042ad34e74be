//! Parameter binding.
//!
//! Each route declares the parameters its handler consumes as a list of
//! [`ParamDefinition`]s. Before the handler runs, the [`Binder`] resolves
//! them against the request into [`BoundArguments`]:
//!
//! - scalars, optionals and lists are converted with `FromStr`
//! - constructor parameters build their value directly from the request
//! - bean parameters are default-constructed and filled through compiled
//!   [`BeanPath`](crate::bean::BeanPath)s, one per request name
//! - injected parameters are cloned from the request's [`Extensions`]
//! - body parameters are decoded from JSON
//!
//! ```
//! use waypoint_core::binder::*;
//! use waypoint_core::bean::BeanRegistry;
//! use waypoint_core::config::RouterConfig;
//! use waypoint_core::extensions::Extensions;
//! use std::sync::Arc;
//!
//! let binder = Binder::new(Arc::new(BeanRegistry::new()), RouterConfig::default());
//! let params = vec![
//!     ParamDefinition::new::<u32>("page", ParamSource::Query),
//!     ParamDefinition::list::<String>("tag", ParamSource::Query),
//! ];
//! let lookup = RequestValues::empty()
//!     .with_value(ParamSource::Query, "page", "2")
//!     .with_value(ParamSource::Query, "tag", "rust")
//!     .with_value(ParamSource::Query, "tag", "web");
//!
//! let args = binder.bind(&params, &lookup, &Extensions::new()).unwrap();
//! assert_eq!(args.get::<u32>("page"), Some(&2));
//! assert_eq!(args.get::<Vec<String>>("tag").unwrap().len(), 2);
//! ```

use crate::bean::{
    check_index_limit, first_member, BeanPathCache, BeanRegistry, Converter, Value,
};
use crate::config::RouterConfig;
use crate::error::{BindingError, ConstructionError};
use crate::extensions::Extensions;
use crate::http::{decode, HttpRequest, MultiMap};
use crate::Error;
use serde::de::DeserializeOwned;
use std::any::{type_name, Any, TypeId};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, trace};

/// Where a parameter's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamSource {
    Path,
    Query,
    Form,
    Header,
    Body,
    Injected,
}

/// Request values as seen by the binder.
pub trait ValueLookup {
    /// All values supplied for `name`.
    fn values(&self, source: ParamSource, name: &str) -> Option<&[String]>;

    /// Every name supplied by `source`.
    fn names(&self, source: ParamSource) -> Vec<&str>;

    /// Raw request body.
    fn body(&self) -> &[u8];

    /// First value supplied for `name`.
    fn first(&self, source: ParamSource, name: &str) -> Option<&str> {
        self.values(source, name)?.first().map(String::as_str)
    }
}

/// [`ValueLookup`] over one request.
#[derive(Debug, Clone, Default)]
pub struct RequestValues<'r> {
    path: MultiMap,
    headers: MultiMap,
    query: Cow<'r, MultiMap>,
    form: Cow<'r, MultiMap>,
    body: Cow<'r, [u8]>,
}

impl<'r> RequestValues<'r> {
    /// Values of `request`, with path variables percent-decoded when
    /// `decode_path` is set.
    pub fn from_request(request: &'r HttpRequest, decode_path: bool) -> Self {
        let path = request
            .path_params
            .iter()
            .map(|(name, raw)| {
                let value = if decode_path {
                    decode(raw).into_owned()
                } else {
                    raw.clone()
                };
                (name.clone(), vec![value])
            })
            .collect();

        let mut headers = MultiMap::new();
        for (name, value) in &request.headers {
            headers
                .entry(name.to_ascii_lowercase())
                .or_default()
                .push(value.clone());
        }

        Self {
            path,
            headers,
            query: Cow::Borrowed(&request.query_params),
            form: Cow::Borrowed(&request.form_params),
            body: Cow::Borrowed(&request.body),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Add one value, keeping earlier values for the same name.
    pub fn with_value(mut self, source: ParamSource, name: &str, value: impl Into<String>) -> Self {
        let map = match source {
            ParamSource::Path => &mut self.path,
            ParamSource::Header => &mut self.headers,
            ParamSource::Query => self.query.to_mut(),
            ParamSource::Form => self.form.to_mut(),
            ParamSource::Body | ParamSource::Injected => return self,
        };
        let key = if source == ParamSource::Header {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        };
        map.entry(key).or_default().push(value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Cow::Owned(body.into());
        self
    }

    fn map(&self, source: ParamSource) -> Option<&MultiMap> {
        match source {
            ParamSource::Path => Some(&self.path),
            ParamSource::Query => Some(&*self.query),
            ParamSource::Form => Some(&*self.form),
            ParamSource::Header => Some(&self.headers),
            ParamSource::Body | ParamSource::Injected => None,
        }
    }
}

impl ValueLookup for RequestValues<'_> {
    fn values(&self, source: ParamSource, name: &str) -> Option<&[String]> {
        let map = self.map(source)?;
        let values = if source == ParamSource::Header {
            map.get(&name.to_ascii_lowercase())
        } else {
            map.get(name)
        };
        values.map(Vec::as_slice)
    }

    fn names(&self, source: ParamSource) -> Vec<&str> {
        self.map(source)
            .map(|map| map.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    fn body(&self) -> &[u8] {
        &self.body
    }
}

type BuildFn = Arc<dyn Fn(&dyn ValueLookup) -> Result<Value, BindingError> + Send + Sync>;

#[derive(Clone)]
enum ParamKind {
    Value { converter: Converter, required: bool },
    Bean { root: TypeId },
    Constructor { consumes: Vec<String>, build: BuildFn },
    Injected { extract: fn(&Extensions) -> Option<Value> },
    Body { parse: fn(&[u8]) -> Result<Value, String> },
}

/// Static description of one handler parameter.
#[derive(Clone)]
pub struct ParamDefinition {
    name: String,
    source: ParamSource,
    type_name: &'static str,
    kind: ParamKind,
}

impl ParamDefinition {
    /// A required scalar; the first supplied value is converted.
    pub fn new<T>(name: impl Into<String>, source: ParamSource) -> Self
    where
        T: FromStr + Send + 'static,
        T::Err: Display,
    {
        Self {
            name: name.into(),
            source,
            type_name: type_name::<T>(),
            kind: ParamKind::Value {
                converter: Converter::scalar::<T>(),
                required: true,
            },
        }
    }

    /// An `Option<T>`, `None` when absent.
    pub fn optional<T>(name: impl Into<String>, source: ParamSource) -> Self
    where
        T: FromStr + Send + 'static,
        T::Err: Display,
    {
        Self {
            name: name.into(),
            source,
            type_name: type_name::<Option<T>>(),
            kind: ParamKind::Value {
                converter: Converter::optional::<T>(),
                required: false,
            },
        }
    }

    /// A `Vec<T>` of every supplied value, empty when absent.
    pub fn list<T>(name: impl Into<String>, source: ParamSource) -> Self
    where
        T: FromStr + Send + 'static,
        T::Err: Display,
    {
        Self {
            name: name.into(),
            source,
            type_name: type_name::<Vec<T>>(),
            kind: ParamKind::Value {
                converter: Converter::list::<T>(),
                required: false,
            },
        }
    }

    /// A registered bean (or registered root list) filled from the names of
    /// `source`. Names may carry a `<name>.` prefix.
    pub fn bean<T: 'static>(name: impl Into<String>, source: ParamSource) -> Self {
        Self {
            name: name.into(),
            source,
            type_name: type_name::<T>(),
            kind: ParamKind::Bean {
                root: TypeId::of::<T>(),
            },
        }
    }

    /// A value built directly from the request. The names in `consumes` are
    /// not offered to bean parameters of the same source.
    pub fn constructor<T, F>(
        name: impl Into<String>,
        source: ParamSource,
        consumes: &[&str],
        build: F,
    ) -> Self
    where
        T: Send + 'static,
        F: Fn(&dyn ValueLookup) -> Result<T, BindingError> + Send + Sync + 'static,
    {
        let build: BuildFn =
            Arc::new(move |lookup: &dyn ValueLookup| build(lookup).map(|v| Box::new(v) as Value));
        Self {
            name: name.into(),
            source,
            type_name: type_name::<T>(),
            kind: ParamKind::Constructor {
                consumes: consumes.iter().map(|c| c.to_string()).collect(),
                build,
            },
        }
    }

    /// A clone of the `T` stored in the request extensions.
    pub fn injected<T: Clone + Send + Sync + 'static>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: ParamSource::Injected,
            type_name: type_name::<T>(),
            kind: ParamKind::Injected {
                extract: extract_clone::<T>,
            },
        }
    }

    /// The request body decoded as JSON.
    pub fn body<T: DeserializeOwned + Send + 'static>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: ParamSource::Body,
            type_name: type_name::<T>(),
            kind: ParamKind::Body {
                parse: decode_json::<T>,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> ParamSource {
        self.source
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is_bean(&self) -> bool {
        matches!(self.kind, ParamKind::Bean { .. })
    }

    /// Request names this parameter takes for itself.
    fn consumed_names(&self) -> Vec<&str> {
        match &self.kind {
            ParamKind::Value { .. } => vec![self.name.as_str()],
            ParamKind::Constructor { consumes, .. } => {
                consumes.iter().map(String::as_str).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl fmt::Debug for ParamDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ParamKind::Value { required: true, .. } => "value",
            ParamKind::Value { .. } => "optional",
            ParamKind::Bean { .. } => "bean",
            ParamKind::Constructor { .. } => "constructor",
            ParamKind::Injected { .. } => "injected",
            ParamKind::Body { .. } => "body",
        };
        f.debug_struct("ParamDefinition")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("type", &self.type_name)
            .field("kind", &kind)
            .finish()
    }
}

fn extract_clone<T: Clone + Send + Sync + 'static>(extensions: &Extensions) -> Option<Value> {
    extensions.get::<T>().map(|value| Box::new(value.clone()) as Value)
}

fn decode_json<T: DeserializeOwned + Send + 'static>(body: &[u8]) -> Result<Value, String> {
    serde_json::from_slice::<T>(body)
        .map(|value| Box::new(value) as Value)
        .map_err(|e| e.to_string())
}

/// Values produced for one route's parameters, in declaration order.
#[derive(Default)]
pub struct BoundArguments {
    values: Vec<(String, Value)>,
}

impl BoundArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.values.retain(|(existing, _)| *existing != name);
        self.values.push((name, value));
    }

    /// Borrow a bound value. `None` when absent or of another type.
    pub fn get<T: 'static>(&self, name: &str) -> Option<&T> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, value)| (**value).downcast_ref::<T>())
    }

    /// Remove and return a bound value. Left in place when of another type.
    pub fn take<T: 'static>(&mut self, name: &str) -> Option<T> {
        let position = self
            .values
            .iter()
            .position(|(n, value)| n == name && (**value).is::<T>())?;
        let (_, value) = self.values.remove(position);
        value.downcast::<T>().ok().map(|value| *value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for BoundArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Binds parameter definitions against requests.
///
/// Owns the bean path cache, so compiled paths live as long as the router.
#[derive(Debug)]
pub struct Binder {
    registry: Arc<BeanRegistry>,
    cache: BeanPathCache,
    config: RouterConfig,
}

impl Binder {
    pub fn new(registry: Arc<BeanRegistry>, config: RouterConfig) -> Self {
        Self {
            registry,
            cache: BeanPathCache::new(),
            config,
        }
    }

    pub fn registry(&self) -> &BeanRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &BeanPathCache {
        &self.cache
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Check at registration time that every bean parameter can be built.
    pub fn validate(&self, params: &[ParamDefinition]) -> Result<(), ConstructionError> {
        for param in params {
            if let ParamKind::Bean { root } = param.kind {
                self.registry
                    .require_constructible_id(root, param.type_name)?;
            }
        }
        Ok(())
    }

    /// Bind `params` against one request.
    pub fn bind(
        &self,
        params: &[ParamDefinition],
        lookup: &dyn ValueLookup,
        extensions: &Extensions,
    ) -> Result<BoundArguments, Error> {
        let mut arguments = BoundArguments::new();
        if params.is_empty() {
            return Ok(arguments);
        }

        let mut consumed: HashSet<(ParamSource, &str)> = HashSet::new();
        for param in params {
            for name in param.consumed_names() {
                consumed.insert((param.source, name));
            }
        }

        for param in params {
            let value = match &param.kind {
                ParamKind::Value {
                    converter,
                    required,
                } => match lookup.values(param.source, &param.name) {
                    Some(values) if !values.is_empty() => converter.convert(&param.name, values)?,
                    _ if *required => return Err(BindingError::Missing(param.name.clone()).into()),
                    _ => converter.convert(&param.name, &[])?,
                },
                ParamKind::Constructor { build, .. } => build(lookup)?,
                ParamKind::Injected { extract } => extract(extensions).ok_or_else(|| {
                    Error::Internal(format!(
                        "No value of type {} available for '{}'",
                        param.type_name, param.name
                    ))
                })?,
                ParamKind::Body { parse } => {
                    let body = lookup.body();
                    if body.is_empty() {
                        return Err(BindingError::Missing(param.name.clone()).into());
                    }
                    parse(body).map_err(Error::Deserialization)?
                }
                ParamKind::Bean { root } => self.bind_bean(param, *root, lookup, &consumed)?,
            };
            trace!(param = %param.name, source = ?param.source, "Bound parameter");
            arguments.insert(param.name.clone(), value);
        }
        Ok(arguments)
    }

    fn bind_bean(
        &self,
        param: &ParamDefinition,
        root: TypeId,
        lookup: &dyn ValueLookup,
        consumed: &HashSet<(ParamSource, &str)>,
    ) -> Result<Value, Error> {
        let mut bean = self.registry.instantiate(root, param.type_name)?;
        let root_is_list = self.registry.is_list(root);

        let mut names: Vec<(&str, &str)> = lookup
            .names(param.source)
            .into_iter()
            .filter(|name| !consumed.contains(&(param.source, *name)))
            .map(|name| (name, strip_prefix(name, &param.name)))
            .collect();
        names.sort_unstable();

        for (name, path) in names {
            let wanted = if root_is_list {
                path.starts_with('[')
            } else {
                first_member(path).is_some_and(|member| self.registry.has_member(root, member))
            };
            if !wanted {
                if self.config.strict_bean_binding {
                    return Err(BindingError::UnknownProperty {
                        type_name: self.registry.describe(root),
                        property: name.to_string(),
                    }
                    .into());
                }
                debug!(name, bean = %param.name, "Skipping name with no matching bean member");
                continue;
            }

            check_index_limit(path, self.config.max_list_index)?;
            let compiled = self.cache.get_or_compile(&self.registry, root, path)?;
            let values = lookup.values(param.source, name).unwrap_or_default();
            compiled.set_raw(bean_mut(&mut bean), values)?;
        }
        Ok(bean)
    }
}

fn bean_mut(bean: &mut Value) -> &mut dyn Any {
    &mut **bean
}

/// `address.city` for `person.address.city` when binding `person`.
fn strip_prefix<'n>(name: &'n str, param: &str) -> &'n str {
    match name.strip_prefix(param) {
        Some(rest) if rest.starts_with('.') => &rest[1..],
        Some(rest) if rest.starts_with('[') => rest,
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_prefix("person.address.city", "person"), "address.city");
        assert_eq!(strip_prefix("items[0].name", "items"), "[0].name");
        assert_eq!(strip_prefix("personal", "person"), "personal");
        assert_eq!(strip_prefix("name", "person"), "name");
    }

    #[test]
    fn test_bound_arguments() {
        let mut args = BoundArguments::new();
        args.insert("id", Box::new(7u64));
        args.insert("name", Box::new("x".to_string()));

        assert_eq!(args.len(), 2);
        assert_eq!(args.get::<u64>("id"), Some(&7));
        assert_eq!(args.get::<String>("id"), None);
        assert_eq!(args.take::<String>("id"), None);
        assert_eq!(args.take::<u64>("id"), Some(7));
        assert!(!args.contains("id"));
        assert_eq!(format!("{:?}", args), r#"["name"]"#);
    }

    #[test]
    fn test_insert_replaces() {
        let mut args = BoundArguments::new();
        args.insert("id", Box::new(1u8));
        args.insert("id", Box::new(2u8));
        assert_eq!(args.len(), 1);
        assert_eq!(args.get::<u8>("id"), Some(&2));
    }

    #[test]
    fn test_request_values_decode_path() {
        let mut request = HttpRequest::new("GET".to_string(), "/".to_string());
        request
            .path_params
            .insert("id".to_string(), "a%20b".to_string());
        request
            .headers
            .insert("X-Tenant".to_string(), "acme".to_string());

        let decoded = RequestValues::from_request(&request, true);
        assert_eq!(decoded.first(ParamSource::Path, "id"), Some("a b"));
        assert_eq!(decoded.first(ParamSource::Header, "x-tenant"), Some("acme"));

        let raw = RequestValues::from_request(&request, false);
        assert_eq!(raw.first(ParamSource::Path, "id"), Some("a%20b"));
    }

    #[test]
    fn test_scalar_binding() {
        let binder = Binder::new(Arc::new(BeanRegistry::new()), RouterConfig::default());
        let params = vec![
            ParamDefinition::new::<i32>("id", ParamSource::Path),
            ParamDefinition::optional::<String>("q", ParamSource::Query),
            ParamDefinition::list::<u8>("n", ParamSource::Query),
        ];
        let lookup = RequestValues::empty().with_value(ParamSource::Path, "id", "-4");

        let args = binder.bind(&params, &lookup, &Extensions::new()).unwrap();
        assert_eq!(args.get::<i32>("id"), Some(&-4));
        assert_eq!(args.get::<Option<String>>("q"), Some(&None));
        assert_eq!(args.get::<Vec<u8>>("n"), Some(&Vec::new()));
    }

    #[test]
    fn test_missing_required() {
        let binder = Binder::new(Arc::new(BeanRegistry::new()), RouterConfig::default());
        let params = vec![ParamDefinition::new::<i32>("id", ParamSource::Path)];
        let err = binder
            .bind(&params, &RequestValues::empty(), &Extensions::new())
            .unwrap_err();
        assert!(matches!(err, Error::Binding(BindingError::Missing(ref n)) if n == "id"));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_injected_and_body() {
        #[derive(Clone, Debug, PartialEq)]
        struct Tenant(&'static str);

        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Payload {
            title: String,
        }

        let binder = Binder::new(Arc::new(BeanRegistry::new()), RouterConfig::default());
        let params = vec![
            ParamDefinition::injected::<Tenant>("tenant"),
            ParamDefinition::body::<Payload>("payload"),
        ];
        let mut extensions = Extensions::new();
        extensions.insert(Tenant("acme"));
        let lookup = RequestValues::empty().with_body(r#"{"title":"hello"}"#);

        let args = binder.bind(&params, &lookup, &extensions).unwrap();
        assert_eq!(args.get::<Tenant>("tenant"), Some(&Tenant("acme")));
        assert_eq!(args.get::<Payload>("payload").unwrap().title, "hello");

        let err = binder
            .bind(&params, &RequestValues::empty().with_body("{"), &extensions)
            .unwrap_err();
        assert!(matches!(err, Error::Deserialization(_)));
    }
}
