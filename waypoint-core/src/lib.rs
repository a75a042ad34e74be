// Core library for the Waypoint HTTP micro-framework
// Route pattern compilation, matching, dispatch and parameter binding

pub mod bean;
pub mod binder;
pub mod config;
pub mod error;
pub mod extensions;
pub mod filter;
pub mod http;
pub mod logging;
pub mod matcher;
pub mod media;
pub mod pattern;
pub mod routing;

// Re-export commonly used types
pub use bean::{BeanPath, BeanPathCache, BeanRegistry, BeanType};
pub use binder::{
    Binder, BoundArguments, ParamDefinition, ParamSource, RequestValues, ValueLookup,
};
pub use config::RouterConfig;
pub use error::*;
pub use extensions::Extensions;
pub use filter::{filter_fn, handler, Chain, ChainResult, Filter};
pub use http::*;
pub use matcher::RouteMatcher;
pub use media::MediaType;
pub use pattern::{RoutePattern, Segment};
pub use routing::{RouteDefinition, RouteMatch, Router};
