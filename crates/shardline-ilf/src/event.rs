use crate::{Ilf, KeyValue};
use core::fmt;
use rand::Rng;
use std::net::Ipv4Addr;

/// Event categories a sample [`Event`] can carry.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    ProcessCreate,
    FileCreate,
    FlowStart,
    LogOn,
}

impl EventKind {
    pub const ALL: [Self; 4] = [
        Self::ProcessCreate,
        Self::FileCreate,
        Self::FlowStart,
        Self::LogOn,
    ];

    /// The ILF event type name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::ProcessCreate => "ProcessCreate",
            Self::FileCreate => "FileCreate",
            Self::FlowStart => "FlowStart",
            Self::LogOn => "LogOn",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A structured event that renders into an [`Ilf`] record.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    /// Seconds since the Unix epoch.
    pub time: i64,
    pub val1: f64,
    pub val2: bool,
    pub val3: String,
}

impl Event {
    /// Converts the event into an ILF record.
    ///
    /// The header is the event type name, the dotted-quad addresses and the
    /// decimal time. The pairs are `val1` with six decimal places, `val2` as
    /// `1` or `0`, and `val3` verbatim, all quoted.
    ///
    /// # Example
    /// ```
    /// use shardline_ilf::{Event, EventKind};
    /// use std::net::Ipv4Addr;
    ///
    /// let event = Event {
    ///     kind: EventKind::FileCreate,
    ///     src: Ipv4Addr::new(192, 168, 0, 1),
    ///     dst: Ipv4Addr::LOCALHOST,
    ///     time: 1_700_000_000,
    ///     val1: 3.5,
    ///     val2: false,
    ///     val3: "abc".into(),
    /// };
    /// assert_eq!(
    ///     event.to_ilf().to_string(),
    ///     r#"FileCreate[192.168.0.1,127.0.0.1,1700000000,(val1="3.500000";val2="0";val3="abc")]"#
    /// );
    /// ```
    pub fn to_ilf(&self) -> Ilf {
        Ilf::new(
            self.kind.name(),
            self.src.to_string(),
            self.dst.to_string(),
            self.time.to_string(),
        )
        .with_pair(KeyValue::quoted("val1", format!("{:.6}", self.val1)))
        .with_pair(KeyValue::quoted("val2", if self.val2 { "1" } else { "0" }))
        .with_pair(KeyValue::quoted("val3", self.val3.as_str()))
    }

    /// A random sample event stamped with `time`.
    ///
    /// Addresses and `val3` are uniform over `u32`, `val1` is uniform in
    /// `[0, 1024)`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, time: i64) -> Self {
        Self {
            kind: EventKind::ALL[rng.random_range(0..EventKind::ALL.len())],
            src: Ipv4Addr::from(rng.random::<u32>()),
            dst: Ipv4Addr::from(rng.random::<u32>()),
            time,
            val1: rng.random_range(0.0..1024.0),
            val2: rng.random_bool(0.5),
            val3: rng.random::<u32>().to_string(),
        }
    }
}

impl From<&Event> for Ilf {
    fn from(event: &Event) -> Self {
        event.to_ilf()
    }
}
