//! Glob patterns for KEYS
//!
//! Supported syntax:
//! - `*` matches any run of characters, including none
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]` match one character from a set; `[^a]` or `[!a]` negate it
//! - `\x` matches `x` literally
//!
//! Matching backtracks only to the most recent `*`, so it stays linear in
//! practice even for patterns like `*a*a*a*b`.

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(char),
    AnyChar,
    AnyRun,
    Class {
        negated: bool,
        ranges: Vec<(char, char)>,
    },
}

impl Token {
    fn accepts(&self, c: char) -> bool {
        match self {
            Token::Literal(l) => *l == c,
            Token::AnyChar => true,
            Token::AnyRun => false,
            Token::Class { negated, ranges } => {
                ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi) != *negated
            }
        }
    }
}

/// Compiled glob pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobPattern {
    tokens: Vec<Token>,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Self {
        let chars: Vec<char> = pattern.chars().collect();
        let mut tokens = Vec::with_capacity(chars.len());
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '*' => {
                    // Consecutive stars behave like one
                    if tokens.last() != Some(&Token::AnyRun) {
                        tokens.push(Token::AnyRun);
                    }
                    i += 1;
                }
                '?' => {
                    tokens.push(Token::AnyChar);
                    i += 1;
                }
                '\\' if i + 1 < chars.len() => {
                    tokens.push(Token::Literal(chars[i + 1]));
                    i += 2;
                }
                '[' => match parse_class(&chars[i + 1..]) {
                    Some((token, used)) => {
                        tokens.push(token);
                        i += used + 1;
                    }
                    None => {
                        // Unterminated class: treat `[` literally
                        tokens.push(Token::Literal('['));
                        i += 1;
                    }
                },
                c => {
                    tokens.push(Token::Literal(c));
                    i += 1;
                }
            }
        }

        Self { tokens }
    }

    /// Check whether `text` matches the whole pattern
    pub fn matches(&self, text: &str) -> bool {
        let text: Vec<char> = text.chars().collect();
        let tokens = &self.tokens;

        let (mut p, mut t) = (0, 0);
        // Pattern index after the last `*`, and the text index it resumes from
        let mut resume: Option<(usize, usize)> = None;

        while t < text.len() {
            match tokens.get(p) {
                Some(Token::AnyRun) => {
                    resume = Some((p + 1, t));
                    p += 1;
                    continue;
                }
                Some(token) if token.accepts(text[t]) => {
                    p += 1;
                    t += 1;
                    continue;
                }
                _ => {}
            }

            match resume {
                Some((star_p, star_t)) => {
                    p = star_p;
                    t = star_t + 1;
                    resume = Some((star_p, star_t + 1));
                }
                None => return false,
            }
        }

        tokens[p..].iter().all(|token| *token == Token::AnyRun)
    }
}

/// Parse the body of a `[...]` class, returning the token and the number of
/// characters consumed including the closing `]`
fn parse_class(chars: &[char]) -> Option<(Token, usize)> {
    let mut i = 0;
    let negated = matches!(chars.first(), Some('^' | '!'));
    if negated {
        i += 1;
    }

    let mut ranges = Vec::new();
    // A `]` right after the opening bracket is a member, not the end
    let mut first = true;
    while i < chars.len() {
        let c = chars[i];
        if c == ']' && !first {
            return Some((Token::Class { negated, ranges }, i + 1));
        }
        first = false;

        let c = if c == '\\' && i + 1 < chars.len() {
            i += 1;
            chars[i]
        } else {
            c
        };

        if i + 2 < chars.len() && chars[i + 1] == '-' && chars[i + 2] != ']' {
            let (lo, hi) = (c, chars[i + 2]);
            ranges.push(if lo <= hi { (lo, hi) } else { (hi, lo) });
            i += 3;
        } else {
            ranges.push((c, c));
            i += 1;
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star() {
        let pattern = GlobPattern::new("user:*");
        assert!(pattern.matches("user:1"));
        assert!(pattern.matches("user:"));
        assert!(!pattern.matches("post:1"));

        let pattern = GlobPattern::new("h*llo");
        assert!(pattern.matches("hello"));
        assert!(pattern.matches("hllo"));
        assert!(pattern.matches("heeeello"));
        assert!(!pattern.matches("hellos"));

        assert!(GlobPattern::new("*").matches(""));
        assert!(GlobPattern::new("**").matches("anything"));
    }

    #[test]
    fn test_question_mark() {
        let pattern = GlobPattern::new("h?llo");
        assert!(pattern.matches("hello"));
        assert!(pattern.matches("hallo"));
        assert!(!pattern.matches("hllo"));
    }

    #[test]
    fn test_classes() {
        let pattern = GlobPattern::new("h[ae]llo");
        assert!(pattern.matches("hello"));
        assert!(pattern.matches("hallo"));
        assert!(!pattern.matches("hillo"));

        let pattern = GlobPattern::new("key[0-9]");
        assert!(pattern.matches("key7"));
        assert!(!pattern.matches("keyx"));

        let pattern = GlobPattern::new("h[^e]llo");
        assert!(pattern.matches("hallo"));
        assert!(!pattern.matches("hello"));
        assert!(GlobPattern::new("h[!e]llo").matches("hallo"));
    }

    #[test]
    fn test_escapes_and_literals() {
        assert!(GlobPattern::new(r"a\*b").matches("a*b"));
        assert!(!GlobPattern::new(r"a\*b").matches("axb"));
        assert!(GlobPattern::new("a[b").matches("a[b"));
        assert!(GlobPattern::new("exact").matches("exact"));
        assert!(!GlobPattern::new("exact").matches("exactly"));
    }

    #[test]
    fn test_unicode_keys() {
        assert!(GlobPattern::new("caf?").matches("café"));
        assert!(GlobPattern::new("*é").matches("café"));
    }

    #[test]
    fn test_backtracking_stays_bounded() {
        let text = "a".repeat(5_000);
        assert!(!GlobPattern::new("*a*a*a*a*a*b").matches(&text));
        assert!(GlobPattern::new("*a*a*a*a*a").matches(&text));
    }
}
