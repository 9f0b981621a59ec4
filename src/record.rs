use std::fmt;

pub const STATUS_KEY: &str = "status";

/// An application number as it appears in the input list. Opaque beyond being non-empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ApplicationNumber(String);

impl ApplicationNumber {
    /// Trims the line and returns `None` for blank ones.
    pub fn from_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parses a newline separated number list, dropping blank lines.
pub fn parse_number_list(raw: &str) -> Vec<ApplicationNumber> {
    raw.lines().filter_map(ApplicationNumber::from_line).collect()
}

/// Session-bound captcha value. Obtained once and reused for every number in a chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptchaToken(String);

impl CaptchaToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Flat label -> value view of one application's detail page.
///
/// Keys keep the position they were first inserted at; re-inserting a key overwrites its value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrademarkRecord {
    fields: Vec<(String, String)>,
}

impl TrademarkRecord {
    pub fn with_status(status: impl Into<String>) -> Self {
        let mut record = Self::default();
        record.insert(STATUS_KEY, status);
        record
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn status(&self) -> Option<&str> {
        self.get(STATUS_KEY)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
