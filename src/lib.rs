//! Request dispatch and response normalization over a pluggable HTTP transport
//!
//! Describe a request once with [`RequestDescriptor`], point a [`Dispatcher`]
//! at an [`Environment`], and receive exactly one [`OperationResult`] per
//! request on a single delivery thread. Bodies come back as JSON with empty
//! arrays normalized to `null`, downloads as a file on disk, and
//! [`JsonDecoder`] turns either into your own types.
//!
//! ```no_run
//! use courier::{Dispatcher, Environment, RequestDescriptor};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct User {
//!     name: String,
//! }
//!
//! # async fn run() -> courier::Result<()> {
//! let dispatcher = Dispatcher::reqwest(Environment::new("https://api.example.com"))?;
//! let result = dispatcher
//!     .execute(RequestDescriptor::builder("/users/42").build())
//!     .await;
//! let (user, response): (User, _) = result.decode()?;
//! println!("{} ({})", user.name, response.status);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

pub use auth::Auth;
pub use body::Body;
pub use decode::{JsonDecoder, ResultDecoder};
pub use delivery::DeliveryQueue;
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use environment::Environment;
pub use error::{Error, Result};
pub use operation::NetworkOperation;
pub use request::{
    BodyFormat, Method, OperationKind, Parameters, RequestDescriptor, RequestDescriptorBuilder,
};
pub use result::{OperationResult, ResponseMetadata};

// Re-export transport types
pub use backend::registry::{Completion, TaskHandle, TaskHandlers, TaskRegistry};
#[cfg(feature = "backend-reqwest")]
pub use backend::reqwest::ReqwestBackend;
pub use backend::types::{
    DataCompletion, FileCompletion, ProgressCallback, TaskId, TransportOutcome, WireRequest,
};
pub use backend::{BackendConfig, Transport};

pub mod auth;
pub mod backend;
pub mod body;
mod decode;
mod delivery;
mod dispatcher;
mod environment;
mod error;
mod operation;
mod request;
mod result;
