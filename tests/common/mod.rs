#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use bangserver::{Bang, Config, Directory, Pools, Server};

pub struct TestServer {
    pub addr: SocketAddr,
    pub pools: Pools,
}

pub fn directory() -> Directory {
    [
        Bang::new("!g", "https://www.google.com/search?q={{{s}}}").with_domain("www.google.com"),
        Bang::new("!w", "https://en.wikipedia.org/wiki/Special:Search?search={{{s}}}"),
        Bang::new("!yt", "https://www.youtube.com/results?search_query={{{s}}}")
            .with_domain("www.youtube.com"),
        Bang::new("!gh", "https://github.com/search?q={{{s}}}").with_domain("github.com"),
        Bang::new("!ddg", "https://duckduckgo.com/?q={{{s}}}&ia=web").with_domain("duckduckgo.com"),
    ]
    .into_iter()
    .collect()
}

pub fn local_config() -> Config {
    Config {
        bind: "127.0.0.1".parse().unwrap(),
        port: 0,
        ..Config::default()
    }
}

pub fn spawn_server() -> TestServer {
    spawn_server_with(local_config(), directory())
}

/// Runs a server on its own single-threaded runtime for the rest of the test
/// process.
pub fn spawn_server_with(config: Config, directory: Directory) -> TestServer {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let server = Server::bind(&config, directory).unwrap();
            tx.send((server.local_addr(), server.pools())).unwrap();
            server.run().await;
        });
    });
    let (addr, pools) = rx.recv().expect("server failed to start");
    TestServer { addr, pools }
}

/// Sends `raw` and reads until the server closes. Bytes received before a
/// reset are kept.
pub fn send_raw(addr: SocketAddr, raw: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.set_write_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(raw).unwrap();

    let mut response = Vec::new();
    let _ = stream.read_to_end(&mut response);
    String::from_utf8_lossy(&response).into_owned()
}

pub fn get(addr: SocketAddr, target: &str) -> String {
    let request = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\nUser-Agent: test\r\n\r\n");
    send_raw(addr, request.as_bytes())
}

pub fn header<'r>(response: &'r str, name: &str) -> Option<&'r str> {
    let head = response.split("\r\n\r\n").next()?;
    head.split("\r\n").skip(1).find_map(|line| {
        let (key, value) = line.split_once(": ")?;
        key.eq_ignore_ascii_case(name).then_some(value)
    })
}

pub fn location(response: &str) -> Option<&str> {
    header(response, "Location")
}

pub fn body(response: &str) -> &str {
    response.split_once("\r\n\r\n").map_or("", |(_, body)| body)
}

/// Waits until only the armed accept holds buffers: two request-pool blocks
/// (request and decode), one encode block and one response block.
pub fn wait_for_idle_pools(pools: &Pools) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if pools.request.in_use() == 2 && pools.encode.in_use() == 1 && pools.response.in_use() == 1 {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}
