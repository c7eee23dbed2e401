//! Text protocol command types

/// Parsed command, borrowing its arguments from the request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// SET <key> <value> [EX <seconds>]
    Set {
        key: &'a str,
        value: &'a str,
        ttl_secs: Option<u64>,
    },

    /// GET <key>
    Get { key: &'a str },

    /// MGET <key> [key ...]
    Mget { keys: Vec<&'a str> },

    /// MSET <key> <value> [key value ...]
    Mset { pairs: Vec<(&'a str, &'a str)> },

    /// KEYS [pattern]
    Keys { pattern: &'a str },

    /// DEL <key>
    Del { key: &'a str },

    /// EXISTS <key>
    Exists { key: &'a str },

    /// TTL <key>
    Ttl { key: &'a str },

    /// INCR <key>
    Incr { key: &'a str },

    /// DECR <key>
    Decr { key: &'a str },

    /// SAVE
    Save,

    /// INFO
    Info,

    /// FLUSHALL
    FlushAll,

    /// QUIT
    Quit,
}

impl Command<'_> {
    /// Upper-case command name
    pub fn name(&self) -> &'static str {
        match self {
            Command::Set { .. } => "SET",
            Command::Get { .. } => "GET",
            Command::Mget { .. } => "MGET",
            Command::Mset { .. } => "MSET",
            Command::Keys { .. } => "KEYS",
            Command::Del { .. } => "DEL",
            Command::Exists { .. } => "EXISTS",
            Command::Ttl { .. } => "TTL",
            Command::Incr { .. } => "INCR",
            Command::Decr { .. } => "DECR",
            Command::Save => "SAVE",
            Command::Info => "INFO",
            Command::FlushAll => "FLUSHALL",
            Command::Quit => "QUIT",
        }
    }

    /// Returns true if this command closes the connection without a reply
    pub fn is_quit(&self) -> bool {
        matches!(self, Command::Quit)
    }
}
