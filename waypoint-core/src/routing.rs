// Route registry and dispatcher

use crate::bean::{BeanRegistry, BeanType};
use crate::binder::{Binder, ParamDefinition};
use crate::config::RouterConfig;
use crate::filter::{handler, Chain, Filter};
use crate::http::parse_pairs;
use crate::logging::{debug, trace, warn};
use crate::media::{can_consume, can_produce, MediaType};
use crate::pattern::{RoutePattern, ANY_METHOD};
use crate::{Error, HttpMethod, HttpRequest, HttpResponse};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A route: pattern, negotiation rules, declared parameters and pipeline.
///
/// ```
/// use waypoint_core::routing::RouteDefinition;
/// use waypoint_core::media::MediaType;
/// use waypoint_core::HttpResponse;
///
/// let route = RouteDefinition::get("/users/:id{[0-9]+}")
///     .unwrap()
///     .named("user")
///     .produces([MediaType::json()])
///     .handler(|_req| async { Ok(HttpResponse::ok()) });
/// assert_eq!(route.route_name(), Some("user"));
/// ```
pub struct RouteDefinition {
    pattern: RoutePattern,
    name: Option<String>,
    consumes: Vec<MediaType>,
    produces: Vec<MediaType>,
    excludes: Vec<RoutePattern>,
    params: Vec<ParamDefinition>,
    before: Vec<Arc<dyn Filter>>,
    terminal: Option<Arc<dyn Filter>>,
}

impl RouteDefinition {
    pub fn new(method: &str, pattern: &str) -> Result<Self, Error> {
        Ok(Self {
            pattern: RoutePattern::compile(method, pattern)?,
            name: None,
            consumes: vec![MediaType::any()],
            produces: vec![MediaType::any()],
            excludes: Vec::new(),
            params: Vec::new(),
            before: Vec::new(),
            terminal: None,
        })
    }

    pub fn get(pattern: &str) -> Result<Self, Error> {
        Self::new(HttpMethod::GET.as_str(), pattern)
    }

    pub fn post(pattern: &str) -> Result<Self, Error> {
        Self::new(HttpMethod::POST.as_str(), pattern)
    }

    pub fn put(pattern: &str) -> Result<Self, Error> {
        Self::new(HttpMethod::PUT.as_str(), pattern)
    }

    pub fn delete(pattern: &str) -> Result<Self, Error> {
        Self::new(HttpMethod::DELETE.as_str(), pattern)
    }

    pub fn patch(pattern: &str) -> Result<Self, Error> {
        Self::new(HttpMethod::PATCH.as_str(), pattern)
    }

    /// Any method.
    pub fn any(pattern: &str) -> Result<Self, Error> {
        Self::new(ANY_METHOD, pattern)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Accepted request content types, replacing the `*/*` default.
    pub fn consumes(mut self, types: impl IntoIterator<Item = MediaType>) -> Self {
        self.consumes = types.into_iter().collect();
        self
    }

    /// Producible response types, replacing the `*/*` default.
    pub fn produces(mut self, types: impl IntoIterator<Item = MediaType>) -> Self {
        self.produces = types.into_iter().collect();
        self
    }

    /// Skip this definition for paths matching `pattern` (any method).
    pub fn exclude(mut self, pattern: &str) -> Result<Self, Error> {
        self.excludes.push(RoutePattern::compile(ANY_METHOD, pattern)?);
        Ok(self)
    }

    pub fn param(mut self, param: ParamDefinition) -> Self {
        self.params.push(param);
        self
    }

    /// Run `filter` before the terminal step.
    pub fn before(mut self, filter: Arc<dyn Filter>) -> Self {
        self.before.push(filter);
        self
    }

    /// Terminal step that always responds.
    pub fn handler<F, Fut>(self, f: F) -> Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.terminal(handler(f))
    }

    /// Terminal step that may pass the request on to the next definition.
    pub fn terminal(mut self, filter: Arc<dyn Filter>) -> Self {
        self.terminal = Some(filter);
        self
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn method(&self) -> &str {
        self.pattern.method()
    }

    pub fn route_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn consumes_types(&self) -> &[MediaType] {
        &self.consumes
    }

    pub fn produces_types(&self) -> &[MediaType] {
        &self.produces
    }

    pub fn params(&self) -> &[ParamDefinition] {
        &self.params
    }

    /// Before filters, then the terminal step.
    pub fn pipeline(&self) -> impl Iterator<Item = &Arc<dyn Filter>> {
        self.before.iter().chain(self.terminal.iter())
    }

    /// Match one request, returning the captured variables.
    pub fn matches(
        &self,
        method: &str,
        path: &str,
        content_type: Option<&MediaType>,
        accept: &[MediaType],
    ) -> Option<HashMap<String, String>> {
        let mut matcher = self.pattern.matcher(method, path);
        if !matcher.matches() {
            return None;
        }
        if self
            .excludes
            .iter()
            .any(|exclude| exclude.matcher(method, path).matches())
        {
            trace!(route = %self.pattern, path, "Path excluded");
            return None;
        }
        if !can_consume(&self.consumes, content_type) || !can_produce(&self.produces, accept) {
            debug!(
                route = %self.pattern,
                content_type = ?content_type.map(MediaType::essence),
                accept = accept.len(),
                "Path matched but content negotiation failed"
            );
            return None;
        }
        Some(matcher.into_vars())
    }
}

impl fmt::Debug for RouteDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("pattern", &self.pattern.to_string())
            .field("name", &self.name)
            .field("consumes", &self.consumes)
            .field("produces", &self.produces)
            .field("params", &self.params)
            .field("steps", &self.pipeline().count())
            .finish()
    }
}

/// One matching definition and its own captured variables.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub definition: Arc<RouteDefinition>,
    pub vars: HashMap<String, String>,
}

/// Registry of route definitions in declaration order.
pub struct Router {
    routes: Vec<Arc<RouteDefinition>>,
    binder: Arc<Binder>,
}

impl Router {
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    pub fn with_config(config: RouterConfig) -> Self {
        Self::with_registry(Arc::new(BeanRegistry::new()), config)
    }

    /// Share a bean registry with other routers.
    pub fn with_registry(registry: Arc<BeanRegistry>, config: RouterConfig) -> Self {
        Self {
            routes: Vec::new(),
            binder: Arc::new(Binder::new(registry, config)),
        }
    }

    pub fn registry(&self) -> &BeanRegistry {
        self.binder.registry()
    }

    pub fn binder(&self) -> &Binder {
        &self.binder
    }

    pub fn config(&self) -> &RouterConfig {
        self.binder.config()
    }

    /// Register a bean type for structured parameters.
    pub fn register_bean<B: Send + 'static>(&self, bean: BeanType<B>) -> Result<(), Error> {
        self.registry().register(bean)?;
        Ok(())
    }

    /// Append a definition. Definitions are never removed or reordered.
    pub fn register(&mut self, definition: RouteDefinition) -> Result<(), Error> {
        if definition.terminal.is_none() {
            return Err(Error::Internal(format!(
                "Route {} has no handler",
                definition.pattern
            )));
        }
        self.binder.validate(definition.params())?;

        debug!(
            route = %definition.pattern,
            name = ?definition.name,
            params = definition.params.len(),
            "Registered route"
        );
        self.routes.push(Arc::new(definition));
        Ok(())
    }

    fn add<F, Fut>(&mut self, method: &str, pattern: &str, f: F) -> Result<(), Error>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.register(RouteDefinition::new(method, pattern)?.handler(f))
    }

    pub fn get<F, Fut>(&mut self, pattern: &str, f: F) -> Result<(), Error>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add(HttpMethod::GET.as_str(), pattern, f)
    }

    pub fn post<F, Fut>(&mut self, pattern: &str, f: F) -> Result<(), Error>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add(HttpMethod::POST.as_str(), pattern, f)
    }

    pub fn put<F, Fut>(&mut self, pattern: &str, f: F) -> Result<(), Error>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add(HttpMethod::PUT.as_str(), pattern, f)
    }

    pub fn delete<F, Fut>(&mut self, pattern: &str, f: F) -> Result<(), Error>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add(HttpMethod::DELETE.as_str(), pattern, f)
    }

    pub fn patch<F, Fut>(&mut self, pattern: &str, f: F) -> Result<(), Error>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add(HttpMethod::PATCH.as_str(), pattern, f)
    }

    pub fn head<F, Fut>(&mut self, pattern: &str, f: F) -> Result<(), Error>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add(HttpMethod::HEAD.as_str(), pattern, f)
    }

    pub fn options<F, Fut>(&mut self, pattern: &str, f: F) -> Result<(), Error>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add(HttpMethod::OPTIONS.as_str(), pattern, f)
    }

    /// Handler for every method.
    pub fn any<F, Fut>(&mut self, pattern: &str, f: F) -> Result<(), Error>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add(ANY_METHOD, pattern, f)
    }

    /// A filter definition: it runs for matching requests in declaration
    /// order and decides whether to continue the chain.
    pub fn filter(
        &mut self,
        method: &str,
        pattern: &str,
        filter: Arc<dyn Filter>,
    ) -> Result<(), Error> {
        self.register(RouteDefinition::new(method, pattern)?.terminal(filter))
    }

    pub fn routes(&self) -> &[Arc<RouteDefinition>] {
        &self.routes
    }

    /// Every definition matching the request, in declaration order.
    ///
    /// An empty result means not found; a content negotiation failure yields
    /// the same empty result.
    pub fn dispatch(
        &self,
        method: &str,
        path: &str,
        content_type: Option<&MediaType>,
        accept: &[MediaType],
    ) -> Vec<RouteMatch> {
        let matches: Vec<RouteMatch> = self
            .routes
            .iter()
            .filter_map(|definition| {
                definition
                    .matches(method, path, content_type, accept)
                    .map(|vars| RouteMatch {
                        definition: definition.clone(),
                        vars,
                    })
            })
            .collect();

        debug!(method, path, matches = matches.len(), "Dispatched request");
        matches
    }

    /// Build the path of a named route.
    pub fn url_for(&self, name: &str, vars: &HashMap<String, String>) -> Result<String, Error> {
        let definition = self
            .routes
            .iter()
            .find(|definition| definition.route_name() == Some(name))
            .ok_or_else(|| Error::RouteNotFound(format!("no route named '{}'", name)))?;
        Ok(definition.pattern.reverse(vars)?)
    }

    /// Dispatch a request and run the chain of every matching definition.
    pub async fn route(&self, mut request: HttpRequest) -> Result<HttpResponse, Error> {
        if let Some((path, query)) = request.path.split_once('?') {
            let query = parse_pairs(query)?;
            let path = path.to_string();
            for (name, values) in query {
                request.query_params.entry(name).or_default().extend(values);
            }
            request.path = path;
        }

        let content_type = request.content_type();
        let is_form = content_type
            .as_ref()
            .is_some_and(|ct| ct.matches(&MediaType::form_urlencoded()) && !ct.is_any());
        if self.config().parse_form_bodies && is_form && !request.body.is_empty() {
            let body = std::str::from_utf8(&request.body)
                .map_err(|_| Error::BadRequest("Form body is not valid UTF-8".to_string()))?;
            for (name, values) in parse_pairs(body)? {
                request.form_params.entry(name).or_default().extend(values);
            }
        }

        let accept = request.accept();
        let matches = self.dispatch(&request.method, &request.path, content_type.as_ref(), &accept);
        let description = format!("{} {}", request.method, request.path);
        if matches.is_empty() {
            return Err(Error::RouteNotFound(description));
        }

        let chain = Chain::new(matches, self.binder.clone());
        match chain.next(request).await? {
            Some(response) => Ok(response),
            None => Err(Error::RouteNotFound(description)),
        }
    }

    /// Like [`route`](Self::route), mapping errors to status responses.
    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        match self.route(request).await {
            Ok(response) => response,
            Err(error) => {
                if error.is_server_error() {
                    warn!(error = %error, "Request failed");
                } else {
                    debug!(error = %error, status = error.status_code(), "Request rejected");
                }
                HttpResponse::from_error(&error)
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes.len())
            .field("binder", &self.binder)
            .finish()
    }
}
