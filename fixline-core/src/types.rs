/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Value types shared by every fixline crate.
//!
//! - [`SeqNum`]: `MsgSeqNum(34)` value
//! - [`Timestamp`]: UTC instant rendered as a FIX `UTCTimestamp`
//! - [`CompId`]: bounded SenderCompID / TargetCompID

use arrayvec::ArrayString;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length for CompID strings in bytes.
pub const COMP_ID_MAX_LEN: usize = 32;

/// `UTCTimestamp` layout with millisecond precision.
const FIX_MILLIS: &str = "%Y%m%d-%H:%M:%S%.3f";

/// Message sequence number.
///
/// Zero is never sent; it marks "nothing seen yet" in session bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeqNum(u64);

impl SeqNum {
    /// Wraps a raw sequence number.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns the following sequence number.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl Default for SeqNum {
    /// The first sequence number of a session.
    fn default() -> Self {
        Self(1)
    }
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// UTC instant carried in `SendingTime(52)` and `OrigSendingTime(122)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns nanoseconds since the Unix epoch, or 0 outside the representable range.
    #[must_use]
    pub fn as_nanos(self) -> u64 {
        self.0
            .timestamp_nanos_opt()
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0)
    }

    /// Renders `YYYYMMDD-HH:MM:SS.sss`.
    #[must_use]
    pub fn to_fix_string(self) -> ArrayString<21> {
        let mut buf = ArrayString::new();
        let _ = fmt::write(&mut buf, format_args!("{}", self.0.format(FIX_MILLIS)));
        buf
    }

    /// Parses a `UTCTimestamp`, with or without a fractional part.
    #[must_use]
    pub fn parse_fix(s: &str) -> Option<Self> {
        let layout = if s.contains('.') {
            "%Y%m%d-%H:%M:%S%.f"
        } else {
            "%Y%m%d-%H:%M:%S"
        };
        NaiveDateTime::parse_from_str(s, layout)
            .ok()
            .map(|naive| Self(naive.and_utc()))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_fix_string())
    }
}

/// SenderCompID / TargetCompID value, at most [`COMP_ID_MAX_LEN`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompId(ArrayString<COMP_ID_MAX_LEN>);

impl CompId {
    /// Creates a CompId.
    ///
    /// # Returns
    /// `None` if `s` is longer than [`COMP_ID_MAX_LEN`] bytes.
    #[must_use]
    pub fn new(s: &str) -> Option<Self> {
        ArrayString::from(s).ok().map(Self)
    }

    /// Returns the CompId as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns true if the CompId is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for CompId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for CompId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
