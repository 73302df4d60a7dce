//! Completion-based I/O on top of tokio.
//!
//! Operations are submitted once with a caller token and run to completion on
//! their own; results come back later, in completion order, through
//! [`Ring::next`]. An operation owns the socket and buffers it touches while
//! it is in flight and hands them back in its [`Completion`]. The completion
//! queue holds at most `depth` entries; finished operations wait for room.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::trace;

use crate::pool::ConnBuffers;

pub type Token = u64;

pub const DEFAULT_QUEUE_DEPTH: usize = 256;

#[derive(Debug)]
pub enum Op {
    Accept,
    /// Receive up to `len` bytes into `buffers.request`.
    Recv {
        stream: TcpStream,
        buffers: ConnBuffers,
        len: usize,
    },
    /// One send of `buffers.response[..len]`. Short writes are not retried.
    Send {
        stream: TcpStream,
        buffers: ConnBuffers,
        len: usize,
    },
    Close {
        stream: TcpStream,
    },
}

#[derive(Debug)]
pub struct Submission {
    pub token: Token,
    pub op: Op,
}

#[derive(Debug)]
pub enum Outcome {
    Accept(io::Result<(TcpStream, SocketAddr)>),
    Recv {
        stream: TcpStream,
        buffers: ConnBuffers,
        result: io::Result<usize>,
    },
    Send {
        stream: TcpStream,
        buffers: ConnBuffers,
        result: io::Result<usize>,
    },
    Close,
}

#[derive(Debug)]
pub struct Completion {
    pub token: Token,
    pub outcome: Outcome,
}

pub struct Ring {
    listener: Arc<TcpListener>,
    completions_tx: mpsc::Sender<Completion>,
    completions: mpsc::Receiver<Completion>,
    in_flight: usize,
}

impl Ring {
    pub fn new(listener: TcpListener, depth: usize) -> Self {
        let (completions_tx, completions) = mpsc::channel(depth.max(1));
        Self {
            listener: Arc::new(listener),
            completions_tx,
            completions,
            in_flight: 0,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Operations submitted and not yet returned by [`Ring::next`].
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Starts `submission`. Must be called from within a tokio runtime.
    pub fn submit(&mut self, submission: Submission) {
        let Submission { token, op } = submission;
        let tx = self.completions_tx.clone();
        self.in_flight += 1;

        match op {
            Op::Accept => {
                let listener = Arc::clone(&self.listener);
                tokio::spawn(async move {
                    let outcome = Outcome::Accept(listener.accept().await);
                    complete(tx, token, outcome).await;
                });
            }
            Op::Recv {
                mut stream,
                mut buffers,
                len,
            } => {
                tokio::spawn(async move {
                    let len = len.min(buffers.request.len());
                    let result = stream.read(&mut buffers.request[..len]).await;
                    let outcome = Outcome::Recv {
                        stream,
                        buffers,
                        result,
                    };
                    complete(tx, token, outcome).await;
                });
            }
            Op::Send {
                mut stream,
                buffers,
                len,
            } => {
                tokio::spawn(async move {
                    let len = len.min(buffers.response.len());
                    let result = stream.write(&buffers.response[..len]).await;
                    let outcome = Outcome::Send {
                        stream,
                        buffers,
                        result,
                    };
                    complete(tx, token, outcome).await;
                });
            }
            Op::Close { mut stream } => {
                tokio::spawn(async move {
                    if let Err(e) = stream.shutdown().await {
                        trace!(token, error = %e, "shutdown failed");
                    }
                    drop(stream);
                    complete(tx, token, Outcome::Close).await;
                });
            }
        }
    }

    /// Waits for the next finished operation.
    pub async fn next(&mut self) -> Option<Completion> {
        let completion = self.completions.recv().await?;
        self.in_flight -= 1;
        Some(completion)
    }
}

async fn complete(tx: mpsc::Sender<Completion>, token: Token, outcome: Outcome) {
    // The receiver only goes away when the ring is dropped, at which point
    // nobody is left to hand the resources back to.
    let _ = tx.send(Completion { token, outcome }).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Pools;

    async fn ring() -> Ring {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        Ring::new(listener, 8)
    }

    #[tokio::test]
    async fn test_accept_recv_send_close() {
        let mut ring = ring().await;
        let addr = ring.local_addr().unwrap();
        let pools = Pools::new(2);

        ring.submit(Submission {
            token: 1,
            op: Op::Accept,
        });
        let mut client = TcpStream::connect(addr).await.unwrap();

        let completion = ring.next().await.unwrap();
        assert_eq!(completion.token, 1);
        let Outcome::Accept(Ok((stream, _peer))) = completion.outcome else {
            panic!("expected accept");
        };

        client.write_all(b"ping").await.unwrap();
        ring.submit(Submission {
            token: 1,
            op: Op::Recv {
                stream,
                buffers: pools.checkout(),
                len: 100,
            },
        });
        let Outcome::Recv {
            stream,
            mut buffers,
            result,
        } = ring.next().await.unwrap().outcome
        else {
            panic!("expected recv");
        };
        let n = result.unwrap();
        assert_eq!(&buffers.request[..n], b"ping");

        buffers.response[..4].copy_from_slice(b"pong");
        ring.submit(Submission {
            token: 1,
            op: Op::Send {
                stream,
                buffers,
                len: 4,
            },
        });
        let Outcome::Send { stream, result, .. } = ring.next().await.unwrap().outcome else {
            panic!("expected send");
        };
        assert_eq!(result.unwrap(), 4);

        ring.submit(Submission {
            token: 1,
            op: Op::Close { stream },
        });
        assert!(matches!(ring.next().await.unwrap().outcome, Outcome::Close));
        assert_eq!(ring.in_flight(), 0);

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert_eq!(reply, b"pong");
    }

    #[tokio::test]
    async fn test_recv_sees_eof() {
        let mut ring = ring().await;
        let addr = ring.local_addr().unwrap();
        let pools = Pools::new(1);

        ring.submit(Submission {
            token: 7,
            op: Op::Accept,
        });
        let client = TcpStream::connect(addr).await.unwrap();
        let Outcome::Accept(Ok((stream, _))) = ring.next().await.unwrap().outcome else {
            panic!("expected accept");
        };
        drop(client);

        ring.submit(Submission {
            token: 7,
            op: Op::Recv {
                stream,
                buffers: pools.checkout(),
                len: 64,
            },
        });
        let completion = ring.next().await.unwrap();
        assert_eq!(completion.token, 7);
        let Outcome::Recv { result, .. } = completion.outcome else {
            panic!("expected recv");
        };
        assert_eq!(result.unwrap(), 0);
    }
}
