use chrono::{DateTime, Utc};

use lookout_core::log_line::{LogLevel, LogLine, Stream};

/// Parses one raw line of demuxed container output into a `LogLine`.
///
/// The runtime prefixes each line with an RFC3339Nano timestamp and a single space; everything
/// after that is the message proper. Level is inferred from, in order: a JSON `level`/`lvl`
/// field, a logfmt `level=`/`lvl=` token, or a leading plain-text keyword. The display message is
/// JSON `msg`/`message`/`error`, logfmt `msg`/`message`, or the remainder of the line untouched.
pub fn parse_line(raw: &str, container_id: &str, stream: Stream, fallback_now: DateTime<Utc>) -> LogLine {
    let (timestamp, rest) = split_timestamp(raw, fallback_now);

    if let Some(line) = parse_json(rest, container_id, stream, timestamp) {
        return line;
    }
    if let Some(line) = parse_logfmt(rest, container_id, stream, timestamp) {
        return line;
    }

    let (level, message) = parse_plaintext(rest);
    LogLine {
        container_id: container_id.to_string(),
        stream,
        timestamp,
        level,
        message,
    }
}

fn split_timestamp(raw: &str, fallback_now: DateTime<Utc>) -> (DateTime<Utc>, &str) {
    if let Some((prefix, rest)) = raw.split_once(' ') {
        if let Ok(ts) = DateTime::parse_from_rfc3339(prefix) {
            return (ts.with_timezone(&Utc), rest);
        }
    }
    (fallback_now, raw)
}

fn parse_json(rest: &str, container_id: &str, stream: Stream, timestamp: DateTime<Utc>) -> Option<LogLine> {
    let trimmed = rest.trim_start();
    if !trimmed.starts_with('{') {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(trimmed).ok()?;
    let level = value
        .get("level")
        .or_else(|| value.get("lvl"))
        .and_then(|v| v.as_str())
        .and_then(LogLevel::normalize);
    let message = value
        .get("msg")
        .or_else(|| value.get("message"))
        .or_else(|| value.get("error"))
        .and_then(|v| v.as_str())
        .unwrap_or(trimmed)
        .to_string();

    Some(LogLine {
        container_id: container_id.to_string(),
        stream,
        timestamp,
        level,
        message,
    })
}

fn parse_logfmt(rest: &str, container_id: &str, stream: Stream, timestamp: DateTime<Utc>) -> Option<LogLine> {
    if !rest.contains('=') {
        return None;
    }
    let mut level = None;
    let mut message = None;
    for token in rest.split_whitespace() {
        if let Some((key, value)) = token.split_once('=') {
            let value = value.trim_matches('"');
            match key {
                "level" | "lvl" => level = level.or_else(|| LogLevel::normalize(value)),
                "msg" | "message" => message = message.or_else(|| Some(value.to_string())),
                _ => {}
            }
        }
    }
    if level.is_none() && message.is_none() {
        return None;
    }
    Some(LogLine {
        container_id: container_id.to_string(),
        stream,
        timestamp,
        level,
        message: message.unwrap_or_else(|| rest.to_string()),
    })
}

fn parse_plaintext(rest: &str) -> (Option<LogLevel>, String) {
    let trimmed = rest.trim_start();
    if let Some((first_word, _)) = trimmed.split_once(char::is_whitespace) {
        if let Some(level) = LogLevel::normalize(first_word.trim_matches(|c: char| !c.is_alphanumeric())) {
            return (Some(level), trimmed.to_string());
        }
    }
    (None, trimmed.to_string())
}
