//! Parsing of the IMAP responses the probe cares about (RFC 3501, 2087).
//!
//! Only the handful of untagged responses needed for a mailbox summary are
//! understood; everything else is carried through as raw lines.

use crate::error::{ValidationError, ValidationResult};

/// Completion status of a tagged command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    No,
    Bad,
}

/// The tagged completion of a command plus the untagged lines before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedResponse {
    pub status: Status,
    /// Text after the status keyword.
    pub text: String,
    pub untagged: Vec<String>,
}

impl TaggedResponse {
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

/// Parse `TAG OK|NO|BAD text` for the given tag.
pub fn parse_tagged<'a>(line: &'a str, tag: &str) -> Option<(Status, &'a str)> {
    let rest = line.strip_prefix(tag)?.strip_prefix(' ')?;
    let (word, text) = rest.split_once(' ').unwrap_or((rest, ""));
    let status = match word.to_ascii_uppercase().as_str() {
        "OK" => Status::Ok,
        "NO" => Status::No,
        "BAD" => Status::Bad,
        _ => return None,
    };
    Some((status, text))
}

/// Capability list from `* CAPABILITY ...` or a `[CAPABILITY ...]`
/// response code embedded in a status line.
pub fn parse_capabilities(line: &str) -> Option<Vec<String>> {
    let upper = line.to_ascii_uppercase();
    let list = if let Some(rest) = upper.strip_prefix("* CAPABILITY ") {
        &line[line.len() - rest.len()..]
    } else {
        let start = upper.find("[CAPABILITY ")? + "[CAPABILITY ".len();
        let end = start + line[start..].find(']')?;
        &line[start..end]
    };
    Some(list.split_whitespace().map(str::to_string).collect())
}

/// Whether exactly `name` is among the capabilities.
///
/// `STATUS=SIZE` and friends are matched whole; asking for `STATUS` does
/// not match them.
pub fn has_capability(caps: &[String], name: &str) -> bool {
    caps.iter().any(|c| c.eq_ignore_ascii_case(name))
}

/// Whether `family` is advertised bare or as `family=...`, as with
/// `QUOTA=RES-STORAGE` or `AUTH=PLAIN`.
pub fn has_capability_family(caps: &[String], family: &str) -> bool {
    caps.iter().any(|c| {
        c.eq_ignore_ascii_case(family)
            || c.split_once('=')
                .is_some_and(|(head, _)| head.eq_ignore_ascii_case(family))
    })
}

/// `* n KEYWORD` as used by EXISTS and RECENT.
fn parse_counted(line: &str, keyword: &str) -> Option<u32> {
    let mut parts = line.strip_prefix("* ")?.split_whitespace();
    let n = parts.next()?.parse().ok()?;
    parts
        .next()
        .filter(|k| k.eq_ignore_ascii_case(keyword))
        .map(|_| n)
}

pub fn parse_exists(line: &str) -> Option<u32> {
    parse_counted(line, "EXISTS")
}

pub fn parse_recent(line: &str) -> Option<u32> {
    parse_counted(line, "RECENT")
}

/// Items of a `* STATUS mailbox (...)` response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusItems {
    pub messages: Option<u32>,
    pub unseen: Option<u32>,
    pub size: Option<u64>,
}

pub fn parse_status(line: &str) -> Option<StatusItems> {
    if !line.to_ascii_uppercase().starts_with("* STATUS ") {
        return None;
    }
    let open = line.rfind('(')?;
    let close = open + line[open..].find(')')?;
    let tokens: Vec<&str> = line[open + 1..close].split_whitespace().collect();

    let mut items = StatusItems::default();
    for pair in tokens.chunks(2) {
        let [name, value] = pair else { break };
        match name.to_ascii_uppercase().as_str() {
            "MESSAGES" => items.messages = value.parse().ok(),
            "UNSEEN" => items.unseen = value.parse().ok(),
            "SIZE" => items.size = value.parse().ok(),
            _ => {}
        }
    }
    Some(items)
}

/// Tally of one response line fed in chunks.
///
/// A `* SEARCH` answer can run far past the line limit on a big mailbox,
/// so hits are counted as the bytes stream past and only the head of the
/// line is kept.
#[derive(Debug, Default)]
pub struct SearchTally {
    head: Vec<u8>,
    numbers: u32,
    in_number: bool,
}

impl SearchTally {
    /// Bytes of the line kept for classification.
    pub const HEAD_LEN: usize = 512;

    pub fn feed(&mut self, chunk: &[u8]) {
        let room = Self::HEAD_LEN.saturating_sub(self.head.len());
        self.head.extend_from_slice(&chunk[..room.min(chunk.len())]);
        for &b in chunk {
            let digit = b.is_ascii_digit();
            if digit && !self.in_number {
                self.numbers = self.numbers.saturating_add(1);
            }
            self.in_number = digit;
        }
    }

    /// The kept head with the terminator stripped.
    pub fn head(&self) -> String {
        String::from_utf8_lossy(&self.head)
            .trim_end_matches(['\r', '\n'])
            .to_string()
    }

    /// Hit count if the line was a `* SEARCH` response.
    pub fn hits(&self) -> Option<u32> {
        let head = self.head();
        let upper = head.to_ascii_uppercase();
        upper
            .strip_prefix("* SEARCH")
            .filter(|r| r.is_empty() || r.starts_with(' '))
            .map(|_| self.numbers)
    }
}

/// `(used, limit)` in kilobytes from `* QUOTA root (STORAGE used limit ...)`.
pub fn parse_quota(line: &str) -> Option<(u64, u64)> {
    if !line.to_ascii_uppercase().starts_with("* QUOTA ") {
        return None;
    }
    let open = line.rfind('(')?;
    let close = open + line[open..].find(')')?;
    let tokens: Vec<&str> = line[open + 1..close].split_whitespace().collect();

    tokens.chunks(3).find_map(|triple| match triple {
        [name, used, limit] if name.eq_ignore_ascii_case("STORAGE") => {
            Some((used.parse().ok()?, limit.parse().ok()?))
        }
        _ => None,
    })
}

/// Literal size announced at the end of a line, as in `... {42}`.
pub fn trailing_literal(line: &str) -> Option<usize> {
    let body = line.strip_suffix('}')?;
    let open = body.rfind('{')?;
    body[open + 1..].trim_end_matches('+').parse().ok()
}

/// Encode a string as an IMAP quoted string.
///
/// CR, LF and NUL cannot appear in a quoted string and are rejected.
pub fn quote(field: &'static str, value: &str) -> ValidationResult<String> {
    if value.contains(['\r', '\n', '\0']) {
        return Err(ValidationError::UnsendableCredential(field));
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    Ok(out)
}
