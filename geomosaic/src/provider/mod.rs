//! Tile provider abstraction.
//!
//! This module owns everything that touches the provider's wire contract:
//! the HTTP transport traits (with `reqwest` implementations and test
//! mocks), static-map URL construction, and HMAC-SHA1 URL signing.
//!
//! The transport is injected into the fetcher at construction time; there is
//! no process-global client. Tests swap in `MockHttpClient` /
//! `MockAsyncHttpClient` to script response sequences without a network.

mod http;
mod signing;
mod staticmap;

pub use http::{
    AsyncHttpClient, AsyncReqwestClient, HttpClient, HttpResponse, ReqwestClient, TransportError,
};
pub use signing::{sign_path_query, SigningError};
pub use staticmap::{build_tile_url, StaticMapParams, STATIC_MAP_HOST, STATIC_MAP_PATH};

#[cfg(test)]
pub use http::tests;
#[cfg(test)]
pub use http::tests::{MockAsyncHttpClient, MockHttpClient};
