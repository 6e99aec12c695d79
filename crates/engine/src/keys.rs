use std::cell::Cell;

/// Whether a prepared write should capture the rowid it assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeneratedKeys {
    #[default]
    None,
    Return,
}

/// Session-local record of the key assigned by the latest write that asked
/// for one.
#[derive(Debug, Default)]
pub struct GeneratedKeyTracker {
    last: Cell<Option<i64>>,
}

impl GeneratedKeyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, key: Option<i64>) {
        self.last.set(key);
    }

    /// `None` until a write requesting keys has run, or when the latest such
    /// write inserted nothing.
    pub fn last(&self) -> Option<i64> {
        self.last.get()
    }
}

/// True when the statement's main verb is INSERT or REPLACE, the only
/// writes that assign a rowid. Leading comments and any `WITH` prefix are
/// skipped; the verb is the first keyword outside parentheses, quotes and
/// comments.
pub fn assigns_rowid(sql: &str) -> bool {
    let bytes = sql.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = sql[i..].find('\n').map_or(bytes.len(), |n| i + n);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = sql[i + 2..].find("*/").map_or(bytes.len(), |n| i + n + 4);
            }
            quote @ (b'\'' | b'"' | b'`' | b'[') => {
                let close = if quote == b'[' { b']' } else { quote };
                i = bytes[i + 1..]
                    .iter()
                    .position(|&b| b == close)
                    .map_or(bytes.len(), |n| i + n + 2);
            }
            b'(' => {
                depth += 1;
                i += 1;
            }
            b')' => {
                depth = depth.saturating_sub(1);
                i += 1;
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                let len = bytes[i..]
                    .iter()
                    .position(|b| !(b.is_ascii_alphanumeric() || *b == b'_'))
                    .unwrap_or(bytes.len() - i);
                let word = &sql[i..i + len];
                i += len;
                if depth > 0 {
                    continue;
                }
                if ["INSERT", "REPLACE"].iter().any(|verb| word.eq_ignore_ascii_case(verb)) {
                    return true;
                }
                if ["UPDATE", "DELETE", "SELECT", "VALUES"]
                    .iter()
                    .any(|verb| word.eq_ignore_ascii_case(verb))
                {
                    return false;
                }
            }
            _ => i += 1,
        }
    }
    false
}
