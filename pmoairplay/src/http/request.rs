use std::collections::HashMap;
use std::io::{BufRead, Read};

use crate::errors::RequestError;

/// Longest head line accepted before the request is rejected.
const MAX_LINE_LEN: u64 = 8 * 1024;

/// Parsed head of an incoming request. The body, if any, is left unread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub target: String,
    pub protocol_version: String,
    headers: HashMap<String, String>,
}

impl Request {
    /// Header lookup, case-insensitive on the name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Whether the connection must be closed once the response is sent.
    ///
    /// Persistence is only granted when the client explicitly asks for it
    /// with a `Connection` value other than `close`.
    pub fn wants_close(&self) -> bool {
        match self.header("connection") {
            Some(value) => value.trim().eq_ignore_ascii_case("close"),
            None => true,
        }
    }
}

/// Read one request head from `reader`, up to and including the empty line.
pub fn read_request<R: BufRead>(reader: &mut R) -> Result<Request, RequestError> {
    let request_line = match read_line(reader)? {
        Some(line) => line,
        None => return Err(RequestError::ConnectionClosed),
    };

    let tokens: Vec<&str> = request_line.split_whitespace().collect();
    let [method, target, protocol_version] = tokens.as_slice() else {
        return Err(RequestError::MalformedRequestLine(request_line.clone()));
    };
    let (method, target, protocol_version) = (
        method.to_string(),
        target.to_string(),
        protocol_version.to_string(),
    );

    let mut headers = HashMap::new();
    loop {
        let line = read_line(reader)?.ok_or(RequestError::UnterminatedHead)?;
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let value = value.strip_prefix(' ').unwrap_or(value);
            headers.insert(name.trim().to_ascii_lowercase(), value.to_string());
        }
    }

    Ok(Request {
        method,
        target,
        protocol_version,
        headers,
    })
}

/// Next line without its terminator, or `None` at end of stream.
fn read_line<R: BufRead>(reader: &mut R) -> Result<Option<String>, RequestError> {
    let mut buf = Vec::new();
    let len = reader.by_ref().take(MAX_LINE_LEN).read_until(b'\n', &mut buf)?;
    if len == 0 {
        return Ok(None);
    }
    if buf.last() != Some(&b'\n') && len as u64 >= MAX_LINE_LEN {
        let head = String::from_utf8_lossy(&buf[..64]).into_owned();
        return Err(RequestError::MalformedRequestLine(head));
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}
