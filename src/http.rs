//! Request-line parsing. Only `METHOD SP target SP VERSION` is looked at;
//! headers and bodies are ignored.

pub const OPENSEARCH_PATH: &[u8] = b"/opensearch.xml";

/// What a request target asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    OpenSearch,
    Search,
    NotFound,
}

impl Route {
    pub fn of(target: &[u8]) -> Route {
        let path_end = target.iter().position(|&b| b == b'?');
        let path = &target[..path_end.unwrap_or(target.len())];

        if path == OPENSEARCH_PATH {
            Route::OpenSearch
        } else if path_end.is_some() {
            Route::Search
        } else if path == b"/" {
            Route::Home
        } else {
            Route::NotFound
        }
    }
}

/// The request target: bytes after the first space up to the next space.
///
/// Returns `None` when the line ends (CRLF) or the data runs out before a
/// second space, i.e. when there is no complete request line.
pub fn parse_target(request: &[u8]) -> Option<&[u8]> {
    let start = request.iter().position(|&b| b == b' ')? + 1;
    let rest = &request[start..];
    let len = rest
        .iter()
        .position(|&b| b == b' ' || b == b'\r' || b == b'\n')?;
    if rest[len] != b' ' {
        return None;
    }
    Some(&rest[..len])
}
