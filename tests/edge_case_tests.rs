mod common;

use std::io::Write;
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use common::*;

const DEFAULT: &str = "https://www.google.com/search?q=";

fn default_with(query: &str) -> String {
    format!("{DEFAULT}{query}")
}

#[cfg(test)]
mod bang_detection_tests {
    use super::*;

    #[test]
    fn test_unknown_bang_falls_back() {
        let server = spawn_server();
        assert_eq!(
            location(&get(server.addr, "/?q=!nosuchbang+cats")),
            Some(default_with("!nosuchbang+cats").as_str())
        );
    }

    #[test]
    fn test_bang_must_follow_space() {
        let server = spawn_server();
        assert_eq!(
            location(&get(server.addr, "/?q=hello!w")),
            Some(default_with("hello!w").as_str())
        );
    }

    #[test]
    fn test_lone_exclamation_is_not_a_bang() {
        let server = spawn_server();
        assert_eq!(
            location(&get(server.addr, "/?q=!+cats")),
            Some(default_with("!+cats").as_str())
        );
    }

    #[test]
    fn test_triggers_are_case_sensitive() {
        let server = spawn_server();
        assert_eq!(
            location(&get(server.addr, "/?q=!W+rust")),
            Some(default_with("!W+rust").as_str())
        );
    }

    #[test]
    fn test_earliest_bang_wins() {
        let server = spawn_server();
        assert_eq!(
            location(&get(server.addr, "/?q=!gh+!w+cats")),
            Some("https://github.com/search?q=!w+cats")
        );
    }

    #[test]
    fn test_unknown_bang_before_known_one() {
        let server = spawn_server();
        assert_eq!(
            location(&get(server.addr, "/?q=!zz+rust+!w")),
            Some("https://en.wikipedia.org/wiki/Special:Search?search=!zz+rust")
        );
    }

    #[test]
    fn test_bang_followed_by_text_is_not_a_trigger() {
        let server = spawn_server();
        // `!wx` is not `!w`.
        assert_eq!(
            location(&get(server.addr, "/?q=!wx+rust")),
            Some(default_with("!wx+rust").as_str())
        );
    }
}

#[cfg(test)]
mod query_shape_tests {
    use super::*;

    #[test]
    fn test_empty_query() {
        let server = spawn_server();
        assert_eq!(location(&get(server.addr, "/?q=")), Some(DEFAULT));
    }

    #[test]
    fn test_only_spaces() {
        let server = spawn_server();
        assert_eq!(
            location(&get(server.addr, "/?q=+++")),
            Some(default_with("+++").as_str())
        );
    }

    #[test]
    fn test_invalid_escapes_pass_through() {
        let server = spawn_server();
        // A stray `%` is kept and then re-escaped.
        assert_eq!(
            location(&get(server.addr, "/?q=100%zz")),
            Some(default_with("100%25zz").as_str())
        );
        assert_eq!(
            location(&get(server.addr, "/?q=50%")),
            Some(default_with("50%25").as_str())
        );
    }

    #[test]
    fn test_lowercase_hex_escapes() {
        let server = spawn_server();
        assert_eq!(
            location(&get(server.addr, "/?q=a%2fb")),
            Some(default_with("a%2Fb").as_str())
        );
    }

    #[test]
    fn test_long_query_fits() {
        let server = spawn_server();
        let words = vec!["rust"; 300].join("+");
        let response = get(server.addr, &format!("/?q=!w+{words}"));
        assert_eq!(
            location(&response).map(str::to_string),
            Some(format!(
                "https://en.wikipedia.org/wiki/Special:Search?search={words}"
            ))
        );
    }

    #[test]
    fn test_redirect_too_large_for_response_block_is_dropped() {
        let server = spawn_server();
        let request = format!("GET /?q={} HTTP/1.1\r\n\r\n", "%2F".repeat(1350));
        assert!(request.len() < 4096);
        assert_eq!(send_raw(server.addr, request.as_bytes()), "");
        // The server keeps serving afterwards.
        assert!(get(server.addr, "/").starts_with("HTTP/1.1 200 OK\r\n"));
    }
}

#[cfg(test)]
mod connection_edge_tests {
    use super::*;

    #[test]
    fn test_incomplete_request_line_gets_no_response() {
        let server = spawn_server();
        assert_eq!(send_raw(server.addr, b"GET /?q=cats"), "");
        assert_eq!(send_raw(server.addr, b"GARBAGE\r\n\r\n"), "");
    }

    #[test]
    fn test_connect_and_hang_up() {
        let server = spawn_server();
        for _ in 0..10 {
            drop(TcpStream::connect(server.addr).unwrap());
        }
        assert!(get(server.addr, "/").starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(wait_for_idle_pools(&server.pools));
    }

    #[test]
    fn test_idle_connection_does_not_block_others() {
        let server = spawn_server();
        let mut idle = TcpStream::connect(server.addr).unwrap();
        thread::sleep(Duration::from_millis(50));

        assert_eq!(
            location(&get(server.addr, "/?q=!gh+x")),
            Some("https://github.com/search?q=x")
        );

        idle.write_all(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        drop(idle);
    }

    #[test]
    fn test_oversized_request_is_truncated_to_block() {
        let server = spawn_server();
        let padding = "a".repeat(8000);
        let request = format!("GET /?q=!w+rust HTTP/1.1\r\nX-Pad: {padding}\r\n\r\n");
        // Only the first read is looked at; the request line fits in it.
        let response = send_raw(server.addr, request.as_bytes());
        if !response.is_empty() {
            assert_eq!(
                location(&response),
                Some("https://en.wikipedia.org/wiki/Special:Search?search=rust")
            );
        }
    }
}
