// Filter chain executed over every definition matching a request

use crate::binder::{Binder, BoundArguments, RequestValues};
use crate::logging::trace;
use crate::routing::{RouteDefinition, RouteMatch};
use crate::{Error, HttpRequest, HttpResponse};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// `Some` terminates the chain, `None` means nothing handled the request.
pub type ChainResult = Result<Option<HttpResponse>, Error>;

/// Type alias for handler functions
pub type HandlerFn = Arc<
    dyn Fn(HttpRequest) -> Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>
        + Send
        + Sync,
>;

/// Type alias for closures used as filters
pub type FilterFn = Arc<
    dyn Fn(HttpRequest, Chain) -> Pin<Box<dyn Future<Output = ChainResult> + Send>> + Send + Sync,
>;

/// One step of a route pipeline.
///
/// A filter either produces a response (ending the chain) or hands the
/// request on with [`Chain::next`].
#[async_trait]
pub trait Filter: Send + Sync {
    async fn handle(&self, req: HttpRequest, chain: Chain) -> ChainResult;
}

struct HandlerFilter {
    handler: HandlerFn,
}

#[async_trait]
impl Filter for HandlerFilter {
    async fn handle(&self, req: HttpRequest, _chain: Chain) -> ChainResult {
        (self.handler)(req).await.map(Some)
    }
}

struct ClosureFilter {
    filter: FilterFn,
}

#[async_trait]
impl Filter for ClosureFilter {
    async fn handle(&self, req: HttpRequest, chain: Chain) -> ChainResult {
        (self.filter)(req, chain).await
    }
}

/// Wrap an async function as a terminal filter that always responds.
pub fn handler<F, Fut>(f: F) -> Arc<dyn Filter>
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
{
    let handler: HandlerFn = Arc::new(move |req: HttpRequest| {
        Box::pin(f(req)) as Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>
    });
    Arc::new(HandlerFilter { handler })
}

/// Wrap an async function taking the chain as a filter.
pub fn filter_fn<F, Fut>(f: F) -> Arc<dyn Filter>
where
    F: Fn(HttpRequest, Chain) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ChainResult> + Send + 'static,
{
    let filter: FilterFn = Arc::new(
        move |req: HttpRequest, chain: Chain| -> Pin<Box<dyn Future<Output = ChainResult> + Send>> {
            Box::pin(f(req, chain))
        },
    );
    Arc::new(ClosureFilter { filter })
}

#[derive(Clone)]
struct ChainEntry {
    filter: Arc<dyn Filter>,
    route: Arc<RouteDefinition>,
    vars: Arc<HashMap<String, String>>,
    /// First pipeline step of its route: variables and arguments are
    /// installed before it runs.
    enters_route: bool,
}

/// The remaining pipeline of a request: every step of every matching
/// definition, in declaration order.
#[derive(Clone)]
pub struct Chain {
    entries: Arc<[ChainEntry]>,
    index: usize,
    binder: Arc<Binder>,
}

impl Chain {
    pub(crate) fn new(matches: Vec<RouteMatch>, binder: Arc<Binder>) -> Self {
        let mut entries = Vec::new();
        for RouteMatch { definition, vars } in matches {
            let vars = Arc::new(vars);
            for (position, filter) in definition.pipeline().enumerate() {
                entries.push(ChainEntry {
                    filter: filter.clone(),
                    route: definition.clone(),
                    vars: vars.clone(),
                    enters_route: position == 0,
                });
            }
        }
        Self {
            entries: entries.into(),
            index: 0,
            binder,
        }
    }

    /// Number of steps left, including the one `next` would run.
    pub fn remaining(&self) -> usize {
        self.entries.len().saturating_sub(self.index)
    }

    /// Run the next step. Returns `Ok(None)` when the chain is exhausted.
    pub async fn next(mut self, mut req: HttpRequest) -> ChainResult {
        let Some(entry) = self.entries.get(self.index).cloned() else {
            trace!("Filter chain exhausted");
            return Ok(None);
        };
        self.index += 1;

        if entry.enters_route {
            self.enter(&entry, &mut req)?;
        }
        trace!(
            step = self.index,
            route = %entry.route.pattern(),
            "Executing filter"
        );
        entry.filter.handle(req, self).await
    }

    fn enter(&self, entry: &ChainEntry, req: &mut HttpRequest) -> Result<(), Error> {
        req.path_params = entry.vars.as_ref().clone();
        req.arguments = if entry.route.params().is_empty() {
            BoundArguments::new()
        } else {
            let lookup =
                RequestValues::from_request(req, self.binder.config().decode_path_variables);
            self.binder
                .bind(entry.route.params(), &lookup, &req.extensions)?
        };
        Ok(())
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("steps", &self.entries.len())
            .field("index", &self.index)
            .finish()
    }
}
