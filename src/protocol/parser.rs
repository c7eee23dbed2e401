//! Hand-written line protocol parser
//!
//! Two steps:
//! 1. Frame one line (up to `\n`, an optional preceding `\r` is dropped)
//! 2. Tokenize on whitespace and check the arguments for the command

use crate::ProtocolError;
use crate::protocol::command::Command;

/// Result of parsing
#[derive(Debug)]
pub enum ParseResult<'a> {
    /// Command fully parsed, with the number of bytes consumed
    Complete(Command<'a>, usize),
    /// Need more data to complete the line
    NeedMoreData,
    /// The line was rejected; the bytes consumed should be skipped
    Error(ProtocolError, usize),
}

/// Parse one command from the front of a buffer
pub fn parse(buf: &[u8]) -> ParseResult<'_> {
    let Some(line_end) = find_line_end(buf) else {
        return ParseResult::NeedMoreData;
    };
    let consumed = line_end + 1;

    let mut line = &buf[..line_end];
    if let [rest @ .., b'\r'] = line {
        line = rest;
    }

    let line = match std::str::from_utf8(line) {
        Ok(line) => line,
        Err(_) => return ParseResult::Error(ProtocolError::InvalidUtf8, consumed),
    };

    match parse_line(line) {
        Ok(cmd) => ParseResult::Complete(cmd, consumed),
        Err(e) => ParseResult::Error(e, consumed),
    }
}

/// Parse a single request line without its terminator
pub fn parse_line(line: &str) -> Result<Command<'_>, ProtocolError> {
    let mut parts = line.split_ascii_whitespace();
    let name = parts.next().ok_or(ProtocolError::EmptyCommand)?;
    let args: Vec<&str> = parts.collect();

    let name = name.to_ascii_uppercase();
    match name.as_str() {
        "SET" => parse_set(&args),
        "GET" => single_key(&args, "GET").map(|key| Command::Get { key }),
        "MGET" => parse_mget(args),
        "MSET" => parse_mset(&args),
        "KEYS" => parse_keys(&args),
        "DEL" => single_key(&args, "DEL").map(|key| Command::Del { key }),
        "EXISTS" => single_key(&args, "EXISTS").map(|key| Command::Exists { key }),
        "TTL" => single_key(&args, "TTL").map(|key| Command::Ttl { key }),
        "INCR" => single_key(&args, "INCR").map(|key| Command::Incr { key }),
        "DECR" => single_key(&args, "DECR").map(|key| Command::Decr { key }),
        "SAVE" => no_args(&args, "SAVE").map(|()| Command::Save),
        "INFO" => no_args(&args, "INFO").map(|()| Command::Info),
        "FLUSHALL" => no_args(&args, "FLUSHALL").map(|()| Command::FlushAll),
        "QUIT" => no_args(&args, "QUIT").map(|()| Command::Quit),
        _ => Err(ProtocolError::UnknownCommand(name)),
    }
}

/// Find the `\n` ending the first line
#[inline]
pub fn find_line_end(buf: &[u8]) -> Option<usize> {
    memchr::memchr(b'\n', buf)
}

fn single_key<'a>(args: &[&'a str], cmd: &'static str) -> Result<&'a str, ProtocolError> {
    match args {
        [key] => Ok(*key),
        _ => Err(ProtocolError::WrongArity(cmd)),
    }
}

fn no_args(args: &[&str], cmd: &'static str) -> Result<(), ProtocolError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(ProtocolError::WrongArity(cmd))
    }
}

/// MGET <key> [key ...]
fn parse_mget(keys: Vec<&str>) -> Result<Command<'_>, ProtocolError> {
    if keys.is_empty() {
        return Err(ProtocolError::WrongArity("MGET"));
    }
    Ok(Command::Mget { keys })
}

/// MSET <key> <value> [key value ...]
fn parse_mset<'a>(args: &[&'a str]) -> Result<Command<'a>, ProtocolError> {
    if args.is_empty() || args.len() % 2 != 0 {
        return Err(ProtocolError::WrongArity("MSET"));
    }
    let pairs = args.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect();
    Ok(Command::Mset { pairs })
}

/// KEYS [pattern], matching everything when the pattern is omitted
fn parse_keys<'a>(args: &[&'a str]) -> Result<Command<'a>, ProtocolError> {
    match args {
        [] => Ok(Command::Keys { pattern: "*" }),
        [pattern] => Ok(Command::Keys { pattern }),
        _ => Err(ProtocolError::WrongArity("KEYS")),
    }
}

/// SET <key> <value> [EX <seconds>]
fn parse_set<'a>(args: &[&'a str]) -> Result<Command<'a>, ProtocolError> {
    let (key, value, options) = match args {
        [key, value, options @ ..] => (*key, *value, options),
        _ => return Err(ProtocolError::NotEnoughArguments("SET")),
    };

    let ttl_secs = match options {
        [] => None,
        [option, rest @ ..] if option.eq_ignore_ascii_case("EX") => match rest {
            [seconds] => Some(parse_expire(seconds)?),
            [] => return Err(ProtocolError::InvalidExpire),
            [_, extra, ..] => return Err(ProtocolError::SyntaxError((*extra).to_string())),
        },
        [option, ..] => return Err(ProtocolError::SyntaxError((*option).to_string())),
    };

    Ok(Command::Set {
        key,
        value,
        ttl_secs,
    })
}

/// Expire times must be positive whole seconds
fn parse_expire(seconds: &str) -> Result<u64, ProtocolError> {
    match seconds.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ProtocolError::InvalidExpire),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_get() {
        let buf = b"GET foo\r\n";
        match parse(buf) {
            ParseResult::Complete(Command::Get { key }, consumed) => {
                assert_eq!(key, "foo");
                assert_eq!(consumed, buf.len());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_bare_newline() {
        let buf = b"DEL foo\nGET bar\n";
        match parse(buf) {
            ParseResult::Complete(Command::Del { key }, consumed) => {
                assert_eq!(key, "foo");
                assert_eq!(consumed, 8);
                match parse(&buf[consumed..]) {
                    ParseResult::Complete(Command::Get { key }, _) => assert_eq!(key, "bar"),
                    other => panic!("unexpected: {other:?}"),
                }
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_need_more_data() {
        assert!(matches!(parse(b"GET foo"), ParseResult::NeedMoreData));
        assert!(matches!(parse(b""), ParseResult::NeedMoreData));
    }

    #[test]
    fn test_parse_error_consumes_line() {
        match parse(b"BOGUS a\r\nGET b\r\n") {
            ParseResult::Error(ProtocolError::UnknownCommand(name), consumed) => {
                assert_eq!(name, "BOGUS");
                assert_eq!(consumed, 9);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_invalid_utf8() {
        assert!(matches!(
            parse(b"GET \xff\xfe\r\n"),
            ParseResult::Error(ProtocolError::InvalidUtf8, 8)
        ));
    }

    #[test]
    fn test_set() {
        assert_eq!(
            parse_line("SET k v"),
            Ok(Command::Set {
                key: "k",
                value: "v",
                ttl_secs: None
            })
        );
        assert_eq!(
            parse_line("set k v ex 10"),
            Ok(Command::Set {
                key: "k",
                value: "v",
                ttl_secs: Some(10)
            })
        );
    }

    #[test]
    fn test_set_missing_value() {
        assert_eq!(
            parse_line("SET k"),
            Err(ProtocolError::NotEnoughArguments("SET"))
        );
        assert_eq!(
            parse_line("SET"),
            Err(ProtocolError::NotEnoughArguments("SET"))
        );
    }

    #[test]
    fn test_set_invalid_expire() {
        for line in ["SET k v EX abc", "SET k v EX 0", "SET k v EX -5", "SET k v EX 1.5", "SET k v EX"] {
            assert_eq!(parse_line(line), Err(ProtocolError::InvalidExpire), "{line}");
        }
    }

    #[test]
    fn test_set_syntax_error() {
        assert_eq!(
            parse_line("SET k v PX 10"),
            Err(ProtocolError::SyntaxError("PX".to_string()))
        );
        assert_eq!(
            parse_line("SET k v EX 10 NX"),
            Err(ProtocolError::SyntaxError("NX".to_string()))
        );
    }

    #[test]
    fn test_wrong_arity() {
        assert_eq!(parse_line("GET k1 k2"), Err(ProtocolError::WrongArity("GET")));
        assert_eq!(parse_line("GET"), Err(ProtocolError::WrongArity("GET")));
        assert_eq!(parse_line("DEL"), Err(ProtocolError::WrongArity("DEL")));
        assert_eq!(parse_line("TTL a b"), Err(ProtocolError::WrongArity("TTL")));
        assert_eq!(parse_line("INCR"), Err(ProtocolError::WrongArity("INCR")));
        assert_eq!(parse_line("DECR a b"), Err(ProtocolError::WrongArity("DECR")));
        assert_eq!(parse_line("SAVE now"), Err(ProtocolError::WrongArity("SAVE")));
    }

    #[test]
    fn test_mget() {
        assert_eq!(
            parse_line("MGET a b c"),
            Ok(Command::Mget {
                keys: vec!["a", "b", "c"]
            })
        );
        assert_eq!(parse_line("mget a"), Ok(Command::Mget { keys: vec!["a"] }));
        assert_eq!(parse_line("MGET"), Err(ProtocolError::WrongArity("MGET")));
    }

    #[test]
    fn test_mset() {
        assert_eq!(
            parse_line("MSET a 1 b 2"),
            Ok(Command::Mset {
                pairs: vec![("a", "1"), ("b", "2")]
            })
        );
        assert_eq!(parse_line("MSET"), Err(ProtocolError::WrongArity("MSET")));
        assert_eq!(
            parse_line("MSET a 1 b"),
            Err(ProtocolError::WrongArity("MSET"))
        );
    }

    #[test]
    fn test_keys() {
        assert_eq!(parse_line("KEYS"), Ok(Command::Keys { pattern: "*" }));
        assert_eq!(
            parse_line("keys user:*"),
            Ok(Command::Keys { pattern: "user:*" })
        );
        assert_eq!(
            parse_line("KEYS a b"),
            Err(ProtocolError::WrongArity("KEYS"))
        );
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse_line("hello world"),
            Err(ProtocolError::UnknownCommand("HELLO".to_string()))
        );
    }

    #[test]
    fn test_empty_line() {
        assert_eq!(parse_line(""), Err(ProtocolError::EmptyCommand));
        assert_eq!(parse_line("   \t "), Err(ProtocolError::EmptyCommand));
    }

    #[test]
    fn test_case_insensitive_commands() {
        assert_eq!(parse_line("incr c"), Ok(Command::Incr { key: "c" }));
        assert_eq!(parse_line("Decr c"), Ok(Command::Decr { key: "c" }));
        assert_eq!(parse_line("info"), Ok(Command::Info));
        assert_eq!(parse_line("FlushAll"), Ok(Command::FlushAll));
        assert_eq!(parse_line("quit"), Ok(Command::Quit));
    }

    #[test]
    fn test_extra_whitespace() {
        assert_eq!(parse_line("  GET   key  "), Ok(Command::Get { key: "key" }));
    }
}
