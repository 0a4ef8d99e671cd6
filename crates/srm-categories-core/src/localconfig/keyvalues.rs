//! KeyValues text format (`.vdf`)
//!
//! Parses into an ordered tree and writes it back in the client's own
//! layout. String contents are kept exactly as written: escape sequences are
//! not interpreted, so a value read and written unchanged round-trips byte
//! for byte.

use std::fmt::Write as _;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct KeyValuesError {
    pub line: usize,
    pub message: String,
}

/// A value in a KeyValues tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyValue {
    String(String),
    Object(KeyValues),
}

impl KeyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&KeyValues> {
        match self {
            Self::Object(o) => Some(o),
            Self::String(_) => None,
        }
    }
}

/// Ordered key/value pairs. Duplicate keys are kept; lookups see the last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValues {
    entries: Vec<(String, KeyValue)>,
}

impl KeyValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &KeyValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, key: &str) -> Option<&KeyValue> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut KeyValue> {
        self.entries
            .iter_mut()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(KeyValue::as_str)
    }

    /// Follow a path of object keys.
    pub fn get_path(&self, path: &[&str]) -> Option<&KeyValue> {
        let (last, parents) = path.split_last()?;
        let mut node = self;
        for key in parents {
            node = node.get(key)?.as_object()?;
        }
        node.get(last)
    }

    /// Replace the value under `key`, or append it.
    pub fn set(&mut self, key: &str, value: KeyValue) {
        match self.get_mut(key) {
            Some(slot) => *slot = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    /// The object under `key`, appended empty when absent.
    ///
    /// Returns `None` if `key` holds a string.
    pub fn object_mut(&mut self, key: &str) -> Option<&mut KeyValues> {
        if self.get(key).is_none() {
            self.entries
                .push((key.to_string(), KeyValue::Object(KeyValues::new())));
        }
        match self.get_mut(key) {
            Some(KeyValue::Object(o)) => Some(o),
            _ => None,
        }
    }
}

pub fn parse(text: &str) -> Result<KeyValues, KeyValuesError> {
    let mut parser = Parser {
        tokens: Tokenizer::new(text),
    };
    parser.object(true)
}

pub fn stringify(tree: &KeyValues) -> String {
    let mut out = String::new();
    write_object(&mut out, tree, 0);
    out
}

fn write_object(out: &mut String, tree: &KeyValues, depth: usize) {
    let indent = "\t".repeat(depth);
    for (key, value) in &tree.entries {
        match value {
            KeyValue::String(s) => {
                let _ = writeln!(out, "{}\"{}\"\t\t\"{}\"", indent, key, s);
            }
            KeyValue::Object(child) => {
                let _ = writeln!(out, "{}\"{}\"", indent, key);
                let _ = writeln!(out, "{}{{", indent);
                write_object(out, child, depth + 1);
                let _ = writeln!(out, "{}}}", indent);
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Quoted(String),
    Bare(String),
    Open,
    Close,
}

struct Tokenizer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(text: &'a str) -> Self {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        Self {
            chars: text.chars().peekable(),
            line: 1,
        }
    }

    fn error(&self, message: impl Into<String>) -> KeyValuesError {
        KeyValuesError {
            line: self.line,
            message: message.into(),
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn skip_trivia(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '/' {
                let mut ahead = self.chars.clone();
                ahead.next();
                if ahead.peek() != Some(&'/') {
                    return;
                }
                while let Some(c) = self.chars.peek() {
                    if *c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else {
                return;
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, KeyValuesError> {
        self.skip_trivia();
        let Some(&c) = self.chars.peek() else {
            return Ok(None);
        };
        match c {
            '{' => {
                self.bump();
                Ok(Some(Token::Open))
            }
            '}' => {
                self.bump();
                Ok(Some(Token::Close))
            }
            '"' => {
                self.bump();
                let mut s = String::new();
                loop {
                    match self.bump() {
                        Some('"') => return Ok(Some(Token::Quoted(s))),
                        Some('\\') => {
                            s.push('\\');
                            match self.bump() {
                                Some(escaped) => s.push(escaped),
                                None => return Err(self.error("unterminated string")),
                            }
                        }
                        Some(other) => s.push(other),
                        None => return Err(self.error("unterminated string")),
                    }
                }
            }
            _ => {
                let mut s = String::new();
                while let Some(&c) = self.chars.peek() {
                    if c.is_whitespace() || c == '{' || c == '}' || c == '"' {
                        break;
                    }
                    s.push(c);
                    self.bump();
                }
                Ok(Some(Token::Bare(s)))
            }
        }
    }
}

struct Parser<'a> {
    tokens: Tokenizer<'a>,
}

impl Parser<'_> {
    fn object(&mut self, top_level: bool) -> Result<KeyValues, KeyValuesError> {
        let mut tree = KeyValues::new();
        loop {
            let key = match self.tokens.next_token()? {
                None if top_level => return Ok(tree),
                None => return Err(self.tokens.error("unexpected end of input, missing '}'")),
                Some(Token::Close) if !top_level => return Ok(tree),
                Some(Token::Close) => return Err(self.tokens.error("unexpected '}'")),
                Some(Token::Open) => return Err(self.tokens.error("expected a key, found '{'")),
                Some(Token::Bare(t)) if is_conditional(&t) => continue,
                Some(Token::Quoted(t)) | Some(Token::Bare(t)) => t,
            };
            let value = match self.tokens.next_token()? {
                Some(Token::Quoted(t)) | Some(Token::Bare(t)) => KeyValue::String(t),
                Some(Token::Open) => KeyValue::Object(self.object(false)?),
                Some(Token::Close) | None => {
                    return Err(self
                        .tokens
                        .error(format!("missing value for key '{}'", key)))
                }
            };
            tree.entries.push((key, value));
        }
    }
}

fn is_conditional(token: &str) -> bool {
    token.starts_with('[') && token.ends_with(']')
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\"UserLocalConfigStore\"\n{\n\t\"Software\"\n\t{\n\t\t\"Valve\"\n\t\t{\n\t\t}\n\t}\n\t\"WebStorage\"\n\t{\n\t\t\"user-collections\"\t\t\"{\\\"srm-SNES\\\":{}}\"\n\t}\n}\n";

    #[test]
    fn test_parse_nested() {
        let tree = parse(SAMPLE).unwrap();
        let raw = tree
            .get_path(&["UserLocalConfigStore", "WebStorage", "user-collections"])
            .and_then(KeyValue::as_str)
            .unwrap();
        assert_eq!(raw, r#"{\"srm-SNES\":{}}"#);
    }

    #[test]
    fn test_stringify_reproduces_client_layout() {
        let tree = parse(SAMPLE).unwrap();
        assert_eq!(stringify(&tree), SAMPLE);
    }

    #[test]
    fn test_parse_comments_unquoted_and_conditionals() {
        let text = "// header\nroot\n{\n\tkey value [$WIN32]\n\t\"other\" \"x\" // trailing\n}\n";
        let tree = parse(text).unwrap();
        let root = tree.get("root").and_then(KeyValue::as_object).unwrap();
        assert_eq!(root.get_str("key"), Some("value"));
        assert_eq!(root.get_str("other"), Some("x"));
        assert_eq!(root.len(), 2);
    }

    #[test]
    fn test_parse_keeps_escapes_raw() {
        let tree = parse(r#""k" "a\\b\"c""#).unwrap();
        assert_eq!(tree.get_str("k"), Some(r#"a\\b\"c"#));
    }

    #[test]
    fn test_quoted_bracket_key_is_not_a_conditional() {
        let text = "\"root\"\n{\n\t\"[note]\"\t\t\"keep me\"\n\t\"b\"\t\t\"c\"\n}\n";
        let tree = parse(text).unwrap();
        let root = tree.get("root").and_then(KeyValue::as_object).unwrap();
        assert_eq!(root.get_str("[note]"), Some("keep me"));
        assert_eq!(root.get_str("b"), Some("c"));
        assert_eq!(stringify(&tree), text);
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let tree = parse("\"a\" \"1\"\n\"a\" \"2\"\n").unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.get_str("a"), Some("2"));
    }

    #[test]
    fn test_parse_errors_report_line() {
        let err = parse("\"root\"\n{\n\t\"key\" \"value\"\n").unwrap_err();
        assert_eq!(err.line, 4);

        let err = parse("\"a\" \"b\"\n}\n").unwrap_err();
        assert_eq!(err.line, 2);

        assert!(parse("\"k\" \"unterminated").is_err());
        assert!(parse("\"lonely\"").is_err());
    }

    #[test]
    fn test_object_mut_creates_and_refuses_strings() {
        let mut tree = KeyValues::new();
        tree.object_mut("a").unwrap().set("b", KeyValue::String("c".into()));
        assert_eq!(tree.get_path(&["a", "b"]).and_then(KeyValue::as_str), Some("c"));

        tree.set("s", KeyValue::String("x".into()));
        assert!(tree.object_mut("s").is_none());
    }
}
