//! Tile source abstraction
//!
//! This module describes where tiles come from ([`TileSource`], an XYZ URL
//! template) and how they are requested ([`AsyncHttpClient`], implemented by
//! [`ReqwestClient`]).
//!
//! ```ignore
//! use std::collections::HashMap;
//! use geomosaic::provider::{ReqwestClient, TileSource};
//!
//! let client = ReqwestClient::new()?;
//! let source = TileSource::named("esri.worldimagery", &HashMap::new())?;
//! ```

mod http;
mod source;
mod types;

pub use http::{AsyncHttpClient, ReqwestClient, DEFAULT_USER_AGENT};
pub use source::{TileSource, DEFAULT_SOURCE_NAME};
pub use types::{HttpResponse, ProviderError, SourceError};

#[cfg(test)]
pub use http::tests::MockHttpClient;
