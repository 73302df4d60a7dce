//! HTTP/1.1 response framing into fixed buffers.
//!
//! Responses are composed byte by byte into a caller buffer without
//! allocating. Every write is bounds-checked: a response that does not fit
//! yields [`ResponseError::Overflow`] and leaves the buffer contents
//! unspecified.

use thiserror::Error;

/// Placeholder in URL templates that receives the encoded search terms.
pub const PLACEHOLDER: &[u8] = b"{{{s}}}";

pub const CONTENT_TYPE_HTML: &str = "text/html";
pub const CONTENT_TYPE_OPENSEARCH: &str = "application/opensearchdescription+xml";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

const REDIRECT_HEAD: &[u8] = b"HTTP/1.1 302 Found\r\nLocation: ";
const REDIRECT_TAIL: &[u8] = b"\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Found,
    NotFound,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Found => 302,
            Status::NotFound => 404,
        }
    }

    fn status_line(self) -> &'static [u8] {
        match self {
            Status::Ok => b"HTTP/1.1 200 OK\r\n",
            Status::Found => b"HTTP/1.1 302 Found\r\n",
            Status::NotFound => b"HTTP/1.1 404 Not Found\r\n",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResponseError {
    #[error("response does not fit in a {capacity}-byte buffer")]
    Overflow { capacity: usize },
}

struct Cursor<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), ResponseError> {
        let end = self.pos + bytes.len();
        let capacity = self.buf.len();
        self.buf
            .get_mut(self.pos..end)
            .ok_or(ResponseError::Overflow { capacity })?
            .copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    fn put_decimal(&mut self, mut n: usize) -> Result<(), ResponseError> {
        let mut digits = [0u8; 20];
        let mut start = digits.len();
        loop {
            start -= 1;
            digits[start] = b'0' + (n % 10) as u8;
            n /= 10;
            if n == 0 {
                break;
            }
        }
        self.put(&digits[start..])
    }

    fn finish(self) -> usize {
        self.pos
    }
}

fn find_placeholder(template: &[u8]) -> Option<usize> {
    template
        .windows(PLACEHOLDER.len())
        .position(|w| w == PLACEHOLDER)
}

/// Writes a `302 Found` whose `Location` is `target` with its placeholder
/// replaced by `query` (or `query` appended when there is no placeholder).
pub fn redirect(target: &str, query: &[u8], out: &mut [u8]) -> Result<usize, ResponseError> {
    let target = target.as_bytes();
    let mut cursor = Cursor::new(out);
    cursor.put(REDIRECT_HEAD)?;
    match find_placeholder(target) {
        Some(at) => {
            cursor.put(&target[..at])?;
            cursor.put(query)?;
            cursor.put(&target[at + PLACEHOLDER.len()..])?;
        }
        None => {
            cursor.put(target)?;
            cursor.put(query)?;
        }
    }
    cursor.put(REDIRECT_TAIL)?;
    Ok(cursor.finish())
}

/// Writes a complete response with a body.
pub fn http_response(
    status: Status,
    content_type: &str,
    body: &[u8],
    out: &mut [u8],
) -> Result<usize, ResponseError> {
    let mut cursor = Cursor::new(out);
    cursor.put(status.status_line())?;
    cursor.put(b"Content-Type: ")?;
    cursor.put(content_type.as_bytes())?;
    cursor.put(b"\r\nContent-Length: ")?;
    cursor.put_decimal(body.len())?;
    cursor.put(b"\r\nConnection: close\r\n\r\n")?;
    cursor.put(body)?;
    Ok(cursor.finish())
}
