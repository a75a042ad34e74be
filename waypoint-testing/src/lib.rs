//! Testing utilities for Waypoint routers.
//!
//! Requests run through the real dispatcher, filter chain and binder,
//! without a network listener.
//!
//! ```
//! use waypoint_testing::*;
//! use waypoint_core::{HttpResponse, Router};
//!
//! # tokio_test::block_on(async {
//! let mut router = Router::new();
//! router
//!     .get("/users/:id{[0-9]+}", |req| async move {
//!         let id = req.param("id").cloned().unwrap_or_default();
//!         Ok(HttpResponse::text(id))
//!     })
//!     .unwrap();
//!
//! let mock = MockRouter::new(router);
//! let response = mock.get("/users/42").await;
//! assert_status(&response, 200);
//! assert_body(&response, "42");
//!
//! mock.get("/users/abc").await.assert_not_found();
//! # });
//! ```
//!
//! ## Recording filter order
//!
//! ```
//! use waypoint_testing::*;
//! use waypoint_core::Router;
//!
//! # tokio_test::block_on(async {
//! let log = CallLog::new();
//! let mut router = Router::new();
//! router.filter("*", "/**", log.pass("audit")).unwrap();
//! router.filter("GET", "/ping", log.respond("ping", 200)).unwrap();
//!
//! let response = MockRouter::new(router).get("/ping").await;
//! assert_status(&response, 200);
//! assert_eq!(log.calls(), vec!["audit", "ping"]);
//! # });
//! ```

mod assertions;
mod mock_router;
mod recorder;
mod request;

pub use assertions::{assert_body, assert_header, assert_json, assert_status};
pub use mock_router::{MockResponse, MockRouter};
pub use recorder::CallLog;
pub use request::MockRequest;
