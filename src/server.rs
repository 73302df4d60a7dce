//! Startup wiring: directory, then pools, then the listener and reactor.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpSocket};
use tracing::info;

use crate::config::Config;
use crate::directory::Directory;
use crate::error::{Error, Result};
use crate::pages::Pages;
use crate::pool::Pools;
use crate::query::QueryProcessor;
use crate::reactor::Reactor;
use crate::ring::Ring;

pub struct Server {
    reactor: Reactor,
    pools: Pools,
    local_addr: SocketAddr,
}

impl Server {
    /// Builds every service and binds the listener. Must be called from
    /// within a tokio runtime. Refuses to start with an empty directory.
    pub fn bind(config: &Config, directory: Directory) -> Result<Self> {
        config.validate()?;
        if directory.is_empty() {
            return Err(Error::EmptyDirectory);
        }

        let directory = Arc::new(directory);
        let pools = Pools::new(config.pool_capacity);
        let processor = QueryProcessor::new(directory, config.default_search.clone());
        let pages = Pages::new(&config.public_url);

        let listener = listen(config.addr(), config.backlog)?;
        let local_addr = listener.local_addr()?;
        let ring = Ring::new(listener, config.queue_depth);

        info!(
            address = %local_addr,
            backlog = config.backlog,
            queue_depth = config.queue_depth,
            "listening"
        );

        Ok(Self {
            reactor: Reactor::new(ring, pools.clone(), processor, pages),
            pools,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handles onto the server's buffer pools, for monitoring.
    pub fn pools(&self) -> Pools {
        self.pools.clone()
    }

    pub async fn run(self) {
        self.reactor.run().await
    }

    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        self.reactor.run_until(shutdown).await
    }
}

fn listen(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}
