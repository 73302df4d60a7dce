//! The connection reactor.
//!
//! Each connection walks `Accept → Read → Process → Write → Close`. The loop
//! is single-threaded: it waits for one completion, advances that
//! connection's state (running request processing synchronously when a read
//! lands) and submits the next operation. Exactly one accept is kept armed.

use std::future::Future;
use std::net::SocketAddr;

use rustc_hash::FxHashMap;
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

use crate::http::{self, Route};
use crate::pages::Pages;
use crate::pool::{ConnBuffers, Pools};
use crate::query::QueryProcessor;
use crate::response::{self, Status};
use crate::ring::{Completion, Op, Outcome, Ring, Submission, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Accept,
    Read,
    Process,
    Write,
    Close,
}

/// Per-connection context. `stream` and `buffers` are `None` only while an
/// operation in the ring holds them.
#[derive(Debug)]
pub struct Connection {
    pub token: Token,
    pub state: ConnState,
    pub peer: Option<SocketAddr>,
    stream: Option<TcpStream>,
    buffers: Option<ConnBuffers>,
    pub bytes_read: usize,
    pub response_len: usize,
}

impl Connection {
    fn new(token: Token, buffers: ConnBuffers) -> Self {
        Self {
            token,
            state: ConnState::Accept,
            peer: None,
            stream: None,
            buffers: Some(buffers),
            bytes_read: 0,
            response_len: 0,
        }
    }
}

pub struct Reactor {
    ring: Ring,
    pools: Pools,
    processor: QueryProcessor,
    pages: Pages,
    connections: FxHashMap<Token, Connection>,
    next_token: Token,
}

impl Reactor {
    pub fn new(ring: Ring, pools: Pools, processor: QueryProcessor, pages: Pages) -> Self {
        Self {
            ring,
            pools,
            processor,
            pages,
            connections: FxHashMap::default(),
            next_token: 0,
        }
    }

    /// Connections currently tracked, including the one waiting in accept.
    pub fn live_connections(&self) -> usize {
        self.connections.len()
    }

    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }

    /// Serves until `shutdown` resolves. Operations still in flight at that
    /// point are abandoned with the runtime.
    pub async fn run_until<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        self.arm_accept();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                completion = self.ring.next() => match completion {
                    Some(completion) => self.on_completion(completion),
                    None => break,
                },
                _ = &mut shutdown => {
                    debug!(live = self.connections.len(), "reactor stopping");
                    break;
                }
            }
        }
    }

    fn arm_accept(&mut self) {
        let token = self.next_token;
        self.next_token += 1;
        self.connections
            .insert(token, Connection::new(token, self.pools.checkout()));
        self.ring.submit(Submission {
            token,
            op: Op::Accept,
        });
    }

    fn on_completion(&mut self, completion: Completion) {
        let Completion { token, outcome } = completion;
        let Some(conn) = self.connections.get_mut(&token) else {
            trace!(token, "completion for unknown connection");
            return;
        };

        match outcome {
            Outcome::Accept(Ok((stream, peer))) => {
                if let Err(e) = stream.set_nodelay(true) {
                    trace!(token, error = %e, "failed to set TCP_NODELAY");
                }
                trace!(token, %peer, "accepted");
                conn.peer = Some(peer);
                conn.state = ConnState::Read;
                conn.stream = Some(stream);
                Self::submit_read(&mut self.ring, conn);
                self.arm_accept();
            }
            Outcome::Accept(Err(e)) => {
                warn!(token, error = %e, "accept failed, re-arming");
                self.ring.submit(Submission {
                    token,
                    op: Op::Accept,
                });
            }
            Outcome::Recv {
                stream,
                mut buffers,
                result,
            } => {
                conn.stream = Some(stream);
                match result {
                    Ok(n) if n > 0 => {
                        conn.bytes_read = n;
                        buffers.request[n] = 0;
                        conn.state = ConnState::Process;
                        conn.response_len = process(&self.processor, &self.pages, &mut buffers, n);
                        conn.buffers = Some(buffers);
                        if conn.response_len == 0 {
                            Self::submit_close(&mut self.ring, conn);
                        } else {
                            conn.state = ConnState::Write;
                            Self::submit_write(&mut self.ring, conn);
                        }
                    }
                    Ok(_) => {
                        conn.buffers = Some(buffers);
                        Self::submit_close(&mut self.ring, conn);
                    }
                    Err(e) => {
                        trace!(token, error = %e, "read failed");
                        conn.buffers = Some(buffers);
                        Self::submit_close(&mut self.ring, conn);
                    }
                }
            }
            Outcome::Send {
                stream,
                buffers,
                result,
            } => {
                match result {
                    Ok(sent) if sent < conn.response_len => {
                        debug!(token, sent, expected = conn.response_len, "short write")
                    }
                    Ok(_) => {}
                    Err(e) => trace!(token, error = %e, "write failed"),
                }
                conn.stream = Some(stream);
                conn.buffers = Some(buffers);
                Self::submit_close(&mut self.ring, conn);
            }
            Outcome::Close => {
                if let Some(conn) = self.connections.remove(&token) {
                    trace!(token, peer = ?conn.peer, bytes_read = conn.bytes_read, "closed");
                }
            }
        }
    }

    fn submit_read(ring: &mut Ring, conn: &mut Connection) {
        let (Some(stream), Some(buffers)) = (conn.stream.take(), conn.buffers.take()) else {
            return;
        };
        // One byte stays free for the terminator.
        let len = buffers.request.len() - 1;
        ring.submit(Submission {
            token: conn.token,
            op: Op::Recv {
                stream,
                buffers,
                len,
            },
        });
    }

    fn submit_write(ring: &mut Ring, conn: &mut Connection) {
        let (Some(stream), Some(buffers)) = (conn.stream.take(), conn.buffers.take()) else {
            return;
        };
        ring.submit(Submission {
            token: conn.token,
            op: Op::Send {
                stream,
                buffers,
                len: conn.response_len,
            },
        });
    }

    /// Buffers stay with the connection until the close completes and the
    /// connection is dropped.
    fn submit_close(ring: &mut Ring, conn: &mut Connection) {
        conn.state = ConnState::Close;
        if let Some(stream) = conn.stream.take() {
            ring.submit(Submission {
                token: conn.token,
                op: Op::Close { stream },
            });
        }
    }
}

/// Turns the `bytes_read` request bytes into a response in
/// `buffers.response`. Returns the response length, or 0 when nothing should
/// be sent.
pub fn process(
    processor: &QueryProcessor,
    pages: &Pages,
    buffers: &mut ConnBuffers,
    bytes_read: usize,
) -> usize {
    let ConnBuffers {
        request,
        decode,
        encode,
        response,
    } = buffers;

    let Some(target) = http::parse_target(&request[..bytes_read]) else {
        trace!("incomplete request line");
        return 0;
    };

    let written = match Route::of(target) {
        Route::Search => {
            let resolved = processor.process(target, decode, encode);
            trace!(bang = resolved.bang.map(|b| b.trigger.as_str()), "resolved");
            response::redirect(resolved.target, resolved.query, response)
        }
        Route::Home => response::http_response(
            Status::Ok,
            response::CONTENT_TYPE_HTML,
            pages.home(),
            response,
        ),
        Route::OpenSearch => response::http_response(
            Status::Ok,
            response::CONTENT_TYPE_OPENSEARCH,
            pages.opensearch(),
            response,
        ),
        Route::NotFound => response::http_response(
            Status::NotFound,
            response::CONTENT_TYPE_TEXT,
            b"Not Found",
            response,
        ),
    };

    written.unwrap_or_else(|e| {
        warn!(error = %e, "dropping response");
        0
    })
}
