//! Apache `LogFormat` compiler.
//!
//! Turns a format description such as `%h %l %u %t "%r" %>s %b` into an
//! ordered list of [`FieldExtractor`]s and one start-anchored regex that
//! captures each field under its own group name.

use std::collections::HashSet;

use regex::Regex;
use thiserror::Error;

/// Errors produced while compiling a format description.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The `%` directive is not one this compiler understands.
    #[error("unknown directive `{0}`")]
    UnknownDirective(String),
    /// A `%` or `%{` at this byte offset never finishes.
    #[error("unterminated directive at byte {0}")]
    UnterminatedDirective(usize),
    /// The assembled pattern was rejected by the regex engine.
    #[error("invalid pattern: {0}")]
    Regex(#[from] regex::Error),
}

/// Broad category of a field, independent of its exact directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldClass {
    /// Request time.
    Timestamp,
    /// Who made the request (address, host, user).
    Identity,
    /// What was requested (request line, path, method, protocol).
    Resource,
    /// Response status.
    Status,
    /// Byte counts.
    ByteCount,
    /// Arbitrary request header.
    Header,
    /// Anything else (ports, server names, timings).
    Other,
}

/// One field a format directive can extract.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// `%a`
    RemoteIp,
    /// `%A`
    LocalIp,
    /// `%h`
    Host,
    /// `%l`
    Logname,
    /// `%m`
    Method,
    /// `%H`
    Protocol,
    /// `%p`
    Port,
    /// `%{local|canonical|remote}p`
    NamedPort(String),
    /// `%r`
    Request,
    /// `%t`
    Time,
    /// `%u`
    User,
    /// `%U`
    UrlPath,
    /// `%v`
    ServerName,
    /// `%V`
    CanonicalServerName,
    /// `%>s`
    Status,
    /// `%b`
    ResponseBytes,
    /// `%T`
    RequestTime,
    /// `%O`
    SentBytes,
    /// `%I`
    ReceivedBytes,
    /// `%{Name}i`
    Header(String),
    /// `%D`
    ServeTimeMicros,
    /// `%S`
    Scheme,
}

const PATTERN_IP: &str = r"[0-9A-Fa-f.:]+";
const PATTERN_SERVER: &str = r"[a-zA-Z0-9]+[a-z0-9.-]*";
const PATTERN_BYTES: &str = r"\d+|-";

impl FieldKind {
    fn from_letter(letter: char) -> Option<Self> {
        Some(match letter {
            'a' => Self::RemoteIp,
            'A' => Self::LocalIp,
            'h' => Self::Host,
            'l' => Self::Logname,
            'm' => Self::Method,
            'H' => Self::Protocol,
            'p' => Self::Port,
            'r' => Self::Request,
            't' => Self::Time,
            'u' => Self::User,
            'U' => Self::UrlPath,
            'v' => Self::ServerName,
            'V' => Self::CanonicalServerName,
            'b' => Self::ResponseBytes,
            'T' => Self::RequestTime,
            'O' => Self::SentBytes,
            'I' => Self::ReceivedBytes,
            'D' => Self::ServeTimeMicros,
            'S' => Self::Scheme,
            _ => return None,
        })
    }

    /// Category of this field.
    #[must_use]
    pub const fn class(&self) -> FieldClass {
        match self {
            Self::Time => FieldClass::Timestamp,
            Self::RemoteIp | Self::Host | Self::Logname | Self::User => FieldClass::Identity,
            Self::Request | Self::Method | Self::UrlPath | Self::Protocol => FieldClass::Resource,
            Self::Status => FieldClass::Status,
            Self::ResponseBytes | Self::SentBytes | Self::ReceivedBytes => FieldClass::ByteCount,
            Self::Header(_) => FieldClass::Header,
            Self::LocalIp
            | Self::Port
            | Self::NamedPort(_)
            | Self::ServerName
            | Self::CanonicalServerName
            | Self::RequestTime
            | Self::ServeTimeMicros
            | Self::Scheme => FieldClass::Other,
        }
    }

    /// Regex group name used for this field.
    #[must_use]
    pub fn group_name(&self) -> String {
        match self {
            Self::RemoteIp => "remote_ip".into(),
            Self::LocalIp => "local_ip".into(),
            Self::Host => "host".into(),
            Self::Logname => "logname".into(),
            Self::Method => "method".into(),
            Self::Protocol => "protocol".into(),
            Self::Port => "port".into(),
            Self::NamedPort(which) => format!("{which}_port"),
            Self::Request => "request".into(),
            Self::Time => "time".into(),
            Self::User => "user".into(),
            Self::UrlPath => "url".into(),
            Self::ServerName => "server_name".into(),
            Self::CanonicalServerName => "canonical_server_name".into(),
            Self::Status => "status".into(),
            Self::ResponseBytes => "response_bytes".into(),
            Self::RequestTime => "request_time".into(),
            Self::SentBytes => "sent_bytes".into(),
            Self::ReceivedBytes => "received_bytes".into(),
            Self::Header(name) => format!("header_{}", sanitize(name)),
            Self::ServeTimeMicros => "serve_time_us".into(),
            Self::Scheme => "scheme".into(),
        }
    }

    const fn pattern(&self) -> &'static str {
        match self {
            Self::RemoteIp | Self::LocalIp => PATTERN_IP,
            Self::Host => r"[a-zA-Z0-9\-._:]+",
            Self::Logname => r"-|[\w-]+",
            Self::Method => "OPTIONS|GET|HEAD|POST|PUT|DELETE|TRACE|CONNECT|PATCH|PROPFIND",
            Self::Protocol => r"HTTP/(?:1\.0|1\.1|2\.0|2|3)",
            Self::Port | Self::NamedPort(_) | Self::ServeTimeMicros => r"\d+",
            Self::Request => r"[A-Z]+ .+? HTTP/(?:1\.0|1\.1|2\.0|2|3)|-|",
            // Any bracketed text; the configured date format decides validity.
            Self::Time => r"[^\]]+",
            Self::User => r"-|[\w\-.@]+",
            Self::UrlPath | Self::Header(_) => r".*?",
            Self::ServerName | Self::CanonicalServerName => PATTERN_SERVER,
            Self::Status => r"\d{3}|-",
            Self::ResponseBytes | Self::SentBytes | Self::ReceivedBytes => PATTERN_BYTES,
            Self::RequestTime => r"\d+\.?\d*",
            Self::Scheme => "https|http",
        }
    }

    /// Render the capture for this field. A field that ends the line takes
    /// the rest of it, so lazy patterns turn greedy there.
    fn render(&self, group: Option<&str>, ends_line: bool) -> String {
        let pattern = match self {
            Self::UrlPath | Self::Header(_) if ends_line => ".*",
            _ => self.pattern(),
        };
        let inner = group.map_or_else(
            || format!("(?:{pattern})"),
            |name| format!("(?P<{name}>{pattern})"),
        );
        if matches!(self, Self::Time) {
            format!(r"\[{inner}\]")
        } else {
            inner
        }
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

/// A compiled field slot, in format order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldExtractor {
    /// Field this slot matches.
    pub kind: FieldKind,
    /// Capture group, or `None` when an earlier slot already captures this field.
    pub group: Option<String>,
}

/// Fields captured from one matching line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine<'a> {
    fields: Vec<(FieldKind, &'a str)>,
}

impl<'a> ParsedLine<'a> {
    /// Captured text for `kind`, if the format has it.
    #[must_use]
    pub fn get(&self, kind: &FieldKind) -> Option<&'a str> {
        self.fields.iter().find(|(k, _)| k == kind).map(|(_, v)| *v)
    }

    /// First captured field of the given class.
    #[must_use]
    pub fn first_of(&self, class: FieldClass) -> Option<(&FieldKind, &'a str)> {
        self.fields
            .iter()
            .find(|(k, _)| k.class() == class)
            .map(|(k, v)| (k, *v))
    }

    /// All captured fields in format order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldKind, &'a str)> {
        self.fields.iter().map(|(k, v)| (k, *v))
    }
}

/// A compiled log format.
#[derive(Debug, Clone)]
pub struct LogFormat {
    source: String,
    extractors: Vec<FieldExtractor>,
    regex: Regex,
}

impl LogFormat {
    /// Compile a format description.
    ///
    /// # Errors
    ///
    /// Fails on unknown or unterminated directives, or if the resulting regex
    /// is rejected.
    pub fn compile(format: &str) -> Result<Self, FormatError> {
        let mut pattern = String::from("^");
        let mut literal = String::new();
        let mut extractors = Vec::new();
        let mut seen = HashSet::new();
        let mut last_field_at = 0;
        let mut chars = format.char_indices();

        while let Some((at, c)) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            let Some(kind) = parse_directive(at, &mut chars)? else {
                // `%%`
                literal.push('%');
                continue;
            };

            pattern.push_str(&regex::escape(&literal));
            literal.clear();

            let name = kind.group_name();
            let group = seen.insert(name.clone()).then_some(name);
            last_field_at = pattern.len();
            pattern.push_str(&kind.render(group.as_deref(), false));
            tracing::debug!(directive = ?kind, group = ?group, "mapped log format directive");
            extractors.push(FieldExtractor { kind, group });
        }
        match extractors.last() {
            Some(last) if literal.is_empty() => {
                pattern.truncate(last_field_at);
                pattern.push_str(&last.kind.render(last.group.as_deref(), true));
            }
            _ => pattern.push_str(&regex::escape(&literal)),
        }

        Ok(Self {
            source: format.to_string(),
            extractors,
            regex: Regex::new(&pattern)?,
        })
    }

    /// The original description.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Field slots in format order.
    #[must_use]
    pub fn extractors(&self) -> &[FieldExtractor] {
        &self.extractors
    }

    /// Whether the format captures `kind`.
    #[must_use]
    pub fn has(&self, kind: &FieldKind) -> bool {
        self.extractors.iter().any(|e| &e.kind == kind)
    }

    /// The compiled regex.
    #[must_use]
    pub const fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Match `line` and return its captured fields.
    #[must_use]
    pub fn extract<'a>(&self, line: &'a str) -> Option<ParsedLine<'a>> {
        let caps = self.regex.captures(line)?;
        let fields = self
            .extractors
            .iter()
            .filter_map(|e| {
                let group = e.group.as_deref()?;
                caps.name(group).map(|m| (e.kind.clone(), m.as_str()))
            })
            .collect();
        Some(ParsedLine { fields })
    }
}

/// Parse the directive whose `%` sits at byte `at`. `Ok(None)` means `%%`.
fn parse_directive(
    at: usize,
    chars: &mut std::str::CharIndices<'_>,
) -> Result<Option<FieldKind>, FormatError> {
    let (_, c) = chars.next().ok_or(FormatError::UnterminatedDirective(at))?;
    match c {
        '%' => Ok(None),
        '>' | '<' => match chars.next() {
            Some((_, 's')) => Ok(Some(FieldKind::Status)),
            Some((_, other)) => Err(FormatError::UnknownDirective(format!("%{c}{other}"))),
            None => Err(FormatError::UnterminatedDirective(at)),
        },
        '{' => {
            let mut name = String::new();
            loop {
                match chars.next() {
                    Some((_, '}')) => break,
                    Some((_, ch)) => name.push(ch),
                    None => return Err(FormatError::UnterminatedDirective(at)),
                }
            }
            match chars.next() {
                Some((_, 'i')) if !name.is_empty() => Ok(Some(FieldKind::Header(name))),
                Some((_, 'p')) if matches!(name.as_str(), "local" | "canonical" | "remote") => {
                    Ok(Some(FieldKind::NamedPort(name)))
                }
                Some((_, other)) => Err(FormatError::UnknownDirective(format!(
                    "%{{{name}}}{other}"
                ))),
                None => Err(FormatError::UnterminatedDirective(at)),
            }
        }
        letter => FieldKind::from_letter(letter)
            .map(Some)
            .ok_or_else(|| FormatError::UnknownDirective(format!("%{letter}"))),
    }
}
