//! Boundary-delimited scanner for `multipart/mixed` bodies.
//!
//! Only what `$batch` responses need: delimiter lines, a header block per part,
//! and embedded `application/http` messages. Lines may end in CRLF or bare LF.
//!
//! A delimiter only counts when it occupies a whole line, so a boundary string
//! that appears inside JSON content never splits a part.

/// A line of `text` with its byte span.
struct Line<'a> {
    /// Offset of the first byte of the line.
    start: usize,
    /// Offset just past the line terminator.
    next: usize,
    /// Line content without `\n` / `\r\n`.
    content: &'a str,
}

fn lines(text: &str) -> impl Iterator<Item = Line<'_>> {
    let mut pos = 0;
    std::iter::from_fn(move || {
        if pos >= text.len() {
            return None;
        }
        let start = pos;
        let (end, next) = match text[start..].find('\n') {
            Some(rel) => (start + rel, start + rel + 1),
            None => (text.len(), text.len()),
        };
        pos = next;
        let content = &text[start..end];
        let content = content.strip_suffix('\r').unwrap_or(content);
        Some(Line {
            start,
            next,
            content,
        })
    })
}

/// Boundary named by the first delimiter line (`--token`) in `text`.
#[must_use]
pub fn first_boundary(text: &str) -> Option<&str> {
    lines(text).find_map(|line| {
        let token = line.content.trim().strip_prefix("--")?;
        let token = token.strip_suffix("--").unwrap_or(token);
        (!token.is_empty() && !token.contains(char::is_whitespace)).then_some(token)
    })
}

/// Raw part contents between delimiter lines for `boundary`.
///
/// Text before the first delimiter (the preamble) is skipped. A missing close
/// delimiter is tolerated: the trailing content becomes the last part.
#[must_use]
pub fn split_parts<'a>(text: &'a str, boundary: &str) -> Vec<&'a str> {
    let delimiter = format!("--{boundary}");
    let close = format!("--{boundary}--");

    let mut parts = Vec::new();
    let mut current: Option<usize> = None;

    for line in lines(text) {
        let content = line.content.trim_end();
        let is_close = content == close;
        if !is_close && content != delimiter {
            continue;
        }
        if let Some(begin) = current.take() {
            parts.push(&text[begin..line.start]);
        }
        if is_close {
            return parts;
        }
        current = Some(line.next);
    }

    if let Some(begin) = current
        && !text[begin..].trim().is_empty()
    {
        parts.push(&text[begin..]);
    }
    parts
}

/// Header block plus body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part<'a> {
    pub headers: Vec<(&'a str, &'a str)>,
    pub body: &'a str,
}

impl<'a> Part<'a> {
    /// Split at the first blank line. Header lines without a `:` are ignored.
    #[must_use]
    pub fn parse(raw: &'a str) -> Self {
        let mut headers = Vec::new();
        for line in lines(raw) {
            if line.content.trim().is_empty() {
                return Self {
                    headers,
                    body: &raw[line.next..],
                };
            }
            if let Some((name, value)) = line.content.split_once(':') {
                headers.push((name.trim(), value.trim()));
            }
        }
        Self { headers, body: "" }
    }

    /// Case-insensitive header lookup; first occurrence wins.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| *value)
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&'a str> {
        self.header("Content-Type")
    }
}

/// `boundary` parameter of a `Content-Type` value, unquoted.
#[must_use]
pub fn boundary_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        (!value.is_empty()).then_some(value)
    })
}

#[must_use]
pub fn is_multipart(content_type: &str) -> bool {
    content_type
        .trim_start()
        .get(..10)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("multipart/"))
}

/// An HTTP response embedded in an `application/http` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMessage<'a> {
    pub status: u16,
    pub reason: &'a str,
    pub part: Part<'a>,
}

impl<'a> HttpMessage<'a> {
    /// `None` when the first non-blank line is not an `HTTP/x.y NNN` status line.
    #[must_use]
    pub fn parse(text: &'a str) -> Option<Self> {
        let status_line = lines(text).find(|line| !line.content.trim().is_empty())?;
        let mut tokens = status_line.content.trim().splitn(3, ' ');
        if !tokens.next()?.starts_with("HTTP/") {
            return None;
        }
        let status = tokens.next()?.parse::<u16>().ok()?;
        let reason = tokens.next().unwrap_or("").trim();
        Some(Self {
            status,
            reason,
            part: Part::parse(&text[status_line.next..]),
        })
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.part.header(name)
    }

    #[must_use]
    pub fn body(&self) -> &'a str {
        self.part.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_boundary_reads_first_delimiter() {
        let text = "\r\n--batchresponse_abc\r\nContent-Type: text/plain\r\n";
        assert_eq!(first_boundary(text), Some("batchresponse_abc"));
    }

    #[test]
    fn first_boundary_rejects_non_multipart_text() {
        assert_eq!(first_boundary("{\"error\": {}}"), None);
        assert_eq!(first_boundary(""), None);
        assert_eq!(first_boundary("--\r\n"), None);
    }

    #[test]
    fn split_parts_returns_contents_between_delimiters() {
        let text = "preamble\r\n--b\r\nfirst\r\n--b\r\nsecond\r\n--b--\r\nepilogue";
        assert_eq!(split_parts(text, "b"), vec!["first\r\n", "second\r\n"]);
    }

    #[test]
    fn split_parts_accepts_bare_lf() {
        let text = "--b\nfirst\n--b\nsecond\n--b--\n";
        assert_eq!(split_parts(text, "b"), vec!["first\n", "second\n"]);
    }

    #[test]
    fn split_parts_ignores_boundary_inside_content() {
        let text = "--b\r\n{\"note\": \"--b\"}\r\nmore --b text\r\n--b--\r\n";
        let parts = split_parts(text, "b");
        assert_eq!(parts.len(), 1);
        assert!(parts[0].contains("more --b text"));
    }

    #[test]
    fn split_parts_keeps_unterminated_tail() {
        let text = "--b\r\nfirst\r\n--b\r\ntruncated";
        assert_eq!(split_parts(text, "b"), vec!["first\r\n", "truncated"]);
    }

    #[test]
    fn split_parts_without_delimiters_is_empty() {
        assert!(split_parts("nothing here", "b").is_empty());
    }

    #[test]
    fn part_parse_splits_headers_and_body() {
        let part = Part::parse("Content-Type: application/http\r\nContent-ID: 3\r\n\r\nbody line\r\n");
        assert_eq!(part.header("content-type"), Some("application/http"));
        assert_eq!(part.header("CONTENT-ID"), Some("3"));
        assert_eq!(part.body, "body line\r\n");
    }

    #[test]
    fn part_parse_without_blank_line_has_empty_body() {
        let part = Part::parse("Content-ID: 1\r\n");
        assert_eq!(part.header("Content-ID"), Some("1"));
        assert_eq!(part.body, "");
    }

    #[test]
    fn boundary_param_handles_quotes_and_case() {
        assert_eq!(
            boundary_param("multipart/mixed; boundary=changesetresponse_1"),
            Some("changesetresponse_1")
        );
        assert_eq!(
            boundary_param("multipart/mixed; charset=utf-8; Boundary=\"quoted\""),
            Some("quoted")
        );
        assert_eq!(boundary_param("application/http"), None);
        assert_eq!(boundary_param("multipart/mixed; boundary="), None);
    }

    #[test]
    fn is_multipart_is_case_insensitive() {
        assert!(is_multipart("Multipart/Mixed; boundary=x"));
        assert!(!is_multipart("application/http"));
        assert!(!is_multipart("multi"));
    }

    #[test]
    fn http_message_parses_status_headers_and_body() {
        let text = "HTTP/1.1 400 Bad Request\r\nContent-Type: application/json\r\n\r\n{\"error\":{}}\r\n";
        let message = HttpMessage::parse(text).unwrap();
        assert_eq!(message.status, 400);
        assert_eq!(message.reason, "Bad Request");
        assert_eq!(message.header("content-type"), Some("application/json"));
        assert_eq!(message.body(), "{\"error\":{}}\r\n");
    }

    #[test]
    fn http_message_rejects_missing_status_line() {
        assert!(HttpMessage::parse("Content-Type: application/json\r\n\r\n{}").is_none());
        assert!(HttpMessage::parse("HTTP/1.1 abc Weird\r\n").is_none());
        assert!(HttpMessage::parse("").is_none());
    }
}
