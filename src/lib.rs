//! A bang redirect server: `GET /?q=!w rust` answers with a 302 to the
//! search engine registered for `!w`, or to the default search otherwise.

pub mod codec;
pub mod config;
pub mod directory;
pub mod error;
pub mod http;
pub mod logging;
pub mod pages;
pub mod pool;
pub mod query;
pub mod reactor;
pub mod response;
pub mod ring;
pub mod server;

pub use config::Config;
pub use directory::{Bang, Category, Directory};
pub use error::{Error, Result};
pub use pool::{BufferPool, ConnBuffers, PoolBuf, Pools};
pub use query::QueryProcessor;
pub use server::Server;
