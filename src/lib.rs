// Waypoint - an HTTP micro-framework core for Rust
//
// Route pattern compilation and matching, ordered dispatch with content
// negotiation, filter chains and structured parameter binding.

// Re-export core functionality
pub use waypoint_core::*;

pub use async_trait::async_trait;

// Re-export optional crates
#[cfg(feature = "testing")]
pub use waypoint_testing;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        async_trait,
        bean::{BeanRegistry, BeanType},
        filter_fn,
        handler,
        BindingError,
        Chain,
        ChainResult,
        ConstructionError,
        Error,
        Filter,
        HttpMethod,
        HttpRequest,
        HttpResponse,
        MediaType,
        ParamDefinition,
        ParamSource,
        RouteDefinition,
        Router,
        RouterConfig,
    };
}
