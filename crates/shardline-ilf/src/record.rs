use core::fmt;

/// A single `key=value` pair inside an [`Ilf`] record.
///
/// Equality ignores [`KeyValue::quoted`]: `a="1"` and `a=1` are the same
/// pair.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
    /// Whether the value is rendered inside double quotes.
    pub quoted: bool,
}

impl Default for KeyValue {
    /// An empty quoted pair, rendered as `=""`.
    fn default() -> Self {
        Self::new("", "", true)
    }
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>, quoted: bool) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            quoted,
        }
    }

    /// A pair rendered as `key="value"`.
    pub fn quoted(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, value, true)
    }

    /// A pair rendered as `key=value`.
    pub fn unquoted(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, value, false)
    }
}

impl PartialEq for KeyValue {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.value == other.value
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quoted {
            write!(f, "{}=\"{}\"", self.key, self.value)
        } else {
            write!(f, "{}={}", self.key, self.value)
        }
    }
}

/// An ILF record: `event[sender,receiver,time,(k1="v1";k2="v2")]`.
///
/// Header fields are kept as text exactly as they are rendered. Two records
/// are equal when every header field matches and their pairs match in order.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ilf {
    pub event_type: String,
    pub sender: String,
    pub receiver: String,
    pub time: String,
    pub pairs: Vec<KeyValue>,
}

impl Ilf {
    /// A record with the given header and no pairs.
    pub fn new(
        event_type: impl Into<String>,
        sender: impl Into<String>,
        receiver: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            sender: sender.into(),
            receiver: receiver.into(),
            time: time.into(),
            pairs: Vec::new(),
        }
    }

    /// Appends `pair` and returns the record.
    #[must_use]
    pub fn with_pair(mut self, pair: KeyValue) -> Self {
        self.pairs.push(pair);
        self
    }
}

impl fmt::Display for Ilf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{},{},{},(",
            self.event_type, self.sender, self.receiver, self.time
        )?;
        for (i, pair) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{pair}")?;
        }
        f.write_str(")]")
    }
}
