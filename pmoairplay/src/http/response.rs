use std::fmt::Write as _;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

use crate::http::range::ByteRange;

static SERVER_TOKEN: Lazy<String> = Lazy::new(|| {
    format!(
        "PMOAirPlay/{} ({})",
        env!("CARGO_PKG_VERSION"),
        pmoutils::get_os_string()
    )
});

/// Product token sent in the `Server` header, e.g. `PMOAirPlay/0.1.0 (Debian/12)`.
pub fn server_token() -> &'static str {
    SERVER_TOKEN.as_str()
}

/// Size of the buffer used to copy file content onto the socket.
pub const COPY_CHUNK_SIZE: usize = 32 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Ok,
    PartialContent,
    BadRequest,
    Forbidden,
    NotFound,
}

impl Status {
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::PartialContent => 206,
            Status::BadRequest => 400,
            Status::Forbidden => 403,
            Status::NotFound => 404,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::PartialContent => "Partial Content",
            Status::BadRequest => "Bad Request",
            Status::Forbidden => "Forbidden",
            Status::NotFound => "Not Found",
        }
    }
}

/// RFC 1123 date in GMT, e.g. `Thu, 26 Mar 2015 09:03:53 GMT`.
pub fn http_date(time: SystemTime) -> String {
    let time: DateTime<Utc> = time.into();
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn connection_value(close: bool) -> &'static str {
    if close { "close" } else { "keep-alive" }
}

fn push_header(head: &mut String, name: &str, value: impl std::fmt::Display) {
    // writing into a String cannot fail
    let _ = write!(head, "{}: {}\r\n", name, value);
}

/// Everything the writer needs to know about the file being served.
#[derive(Clone, Debug)]
pub struct FileBody<'a> {
    pub length: u64,
    pub modified: SystemTime,
    pub content_type: &'a str,
}

/// Render an empty-bodied error response.
pub fn write_error<W: Write>(sink: &mut W, status: Status, close: bool) -> io::Result<()> {
    let mut head = format!("HTTP/1.1 {} {}\r\n", status.code(), status.reason());
    push_header(&mut head, "Date", http_date(SystemTime::now()));
    push_header(&mut head, "Server", server_token());
    push_header(&mut head, "Content-Length", 0);
    push_header(&mut head, "Connection", connection_value(close));
    head.push_str("\r\n");
    sink.write_all(head.as_bytes())?;
    sink.flush()
}

/// Render the head of a 200 (`range == None`) or 206 response.
pub fn render_file_head(body: &FileBody<'_>, range: Option<ByteRange>, close: bool) -> String {
    let status = if range.is_some() {
        Status::PartialContent
    } else {
        Status::Ok
    };
    let content_length = range.map_or(body.length, |r| r.len());

    let mut head = format!("HTTP/1.1 {} {}\r\n", status.code(), status.reason());
    push_header(&mut head, "Date", http_date(SystemTime::now()));
    push_header(&mut head, "Last-Modified", http_date(body.modified));
    push_header(&mut head, "Server", server_token());
    push_header(&mut head, "Accept-Ranges", "bytes");
    push_header(&mut head, "Content-Length", content_length);
    if let Some(r) = range {
        push_header(
            &mut head,
            "Content-Range",
            format!("bytes {}-{}/{}", r.start, r.end, body.length),
        );
    }
    push_header(&mut head, "Content-Type", body.content_type);
    push_header(&mut head, "Connection", connection_value(close));
    push_header(&mut head, "Cache-Control", "private, max-age=0");
    head.push_str("\r\n");
    head
}

/// Write a full (200) or partial (206) file response.
///
/// `range` must already be satisfiable for `body.length`. Returns the number
/// of body bytes written.
pub fn write_file<W, R>(
    sink: &mut W,
    source: &mut R,
    body: &FileBody<'_>,
    range: Option<ByteRange>,
    close: bool,
) -> io::Result<u64>
where
    W: Write,
    R: Read + Seek,
{
    let head = render_file_head(body, range, close);
    sink.write_all(head.as_bytes())?;

    let (offset, length) = range.map_or((0, body.length), |r| (r.start, r.len()));
    source.seek(SeekFrom::Start(offset))?;
    let written = copy_bounded(source, sink, length)?;
    sink.flush()?;
    Ok(written)
}

/// Copy exactly `length` bytes in fixed-size chunks.
fn copy_bounded<R: Read, W: Write>(source: &mut R, sink: &mut W, length: u64) -> io::Result<u64> {
    let mut buffer = vec![0u8; COPY_CHUNK_SIZE];
    let mut remaining = length;
    while remaining > 0 {
        let want = remaining.min(COPY_CHUNK_SIZE as u64) as usize;
        let read = match source.read(&mut buffer[..want]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("file ended {} bytes early", remaining),
                ));
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        sink.write_all(&buffer[..read])?;
        remaining -= read as u64;
    }
    Ok(length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::{Duration, UNIX_EPOCH};

    fn body(length: u64) -> FileBody<'static> {
        FileBody {
            length,
            modified: UNIX_EPOCH + Duration::from_secs(1_427_360_633),
            content_type: "video/mp4",
        }
    }

    fn split(raw: &[u8]) -> (String, Vec<u8>) {
        let pos = raw.windows(4).position(|w| w == b"\r\n\r\n").unwrap();
        (
            String::from_utf8(raw[..pos + 2].to_vec()).unwrap(),
            raw[pos + 4..].to_vec(),
        )
    }

    fn header_names(head: &str) -> Vec<String> {
        head.lines()
            .skip(1)
            .map(|l| l.split(':').next().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_http_date() {
        let t = UNIX_EPOCH + Duration::from_secs(1_427_360_633);
        assert_eq!(http_date(t), "Thu, 26 Mar 2015 09:03:53 GMT");
    }

    #[test]
    fn test_full_response() {
        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let mut sink = Vec::new();
        let written =
            write_file(&mut sink, &mut Cursor::new(&data), &body(100_000), None, true).unwrap();
        assert_eq!(written, 100_000);

        let (head, payload) = split(&sink);
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(
            header_names(&head),
            [
                "Date",
                "Last-Modified",
                "Server",
                "Accept-Ranges",
                "Content-Length",
                "Content-Type",
                "Connection",
                "Cache-Control"
            ]
        );
        assert!(head.contains("Last-Modified: Thu, 26 Mar 2015 09:03:53 GMT\r\n"));
        assert!(head.contains("Content-Length: 100000\r\n"));
        assert!(head.contains("Connection: close\r\n"));
        assert!(head.contains("Cache-Control: private, max-age=0\r\n"));
        assert_eq!(payload, data);
    }

    #[test]
    fn test_partial_response() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 256) as u8).collect();
        let range = ByteRange { start: 100, end: 199 };
        let mut sink = Vec::new();
        let written =
            write_file(&mut sink, &mut Cursor::new(&data), &body(1000), Some(range), false)
                .unwrap();
        assert_eq!(written, 100);

        let (head, payload) = split(&sink);
        assert!(head.starts_with("HTTP/1.1 206 Partial Content\r\n"));
        assert!(head.contains("Content-Length: 100\r\n"));
        assert!(head.contains("Content-Range: bytes 100-199/1000\r\n"));
        assert!(head.contains("Connection: keep-alive\r\n"));
        let names = header_names(&head);
        let pos = |n: &str| names.iter().position(|h| h == n).unwrap();
        assert_eq!(pos("Content-Range"), pos("Content-Length") + 1);
        assert_eq!(payload, &data[100..200]);
    }

    #[test]
    fn test_short_source_is_an_error() {
        let data = vec![7u8; 10];
        let mut sink = Vec::new();
        let err = write_file(&mut sink, &mut Cursor::new(&data), &body(50), None, true)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_error_response() {
        let mut sink = Vec::new();
        write_error(&mut sink, Status::NotFound, true).unwrap();
        let (head, payload) = split(&sink);
        assert!(head.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert_eq!(
            header_names(&head),
            ["Date", "Server", "Content-Length", "Connection"]
        );
        assert!(head.contains("Content-Length: 0\r\n"));
        assert!(payload.is_empty());
    }

    #[test]
    fn test_server_token() {
        let token = server_token();
        assert!(token.starts_with("PMOAirPlay/"));
        assert!(token.ends_with(')'));
    }

    #[test]
    fn test_status_lines() {
        let line = |s: Status| format!("{} {}", s.code(), s.reason());
        assert_eq!(line(Status::Ok), "200 OK");
        assert_eq!(line(Status::PartialContent), "206 Partial Content");
        assert_eq!(line(Status::BadRequest), "400 Bad Request");
        assert_eq!(line(Status::Forbidden), "403 Forbidden");
        assert_eq!(line(Status::NotFound), "404 Not Found");
    }
}
