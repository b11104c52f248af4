/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Inbound sequence number classification.

use fixline_core::types::SeqNum;

/// Result of sequence number validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceResult {
    /// Sequence number is as expected.
    Ok,
    /// Lower than expected but flagged PossDup; safe to ignore.
    Duplicate {
        /// Received sequence number.
        received: u64,
    },
    /// Sequence number is lower than expected and not a possible duplicate.
    TooLow {
        /// Expected sequence number.
        expected: u64,
        /// Received sequence number.
        received: u64,
    },
    /// Sequence number is higher than expected (gap detected).
    Gap {
        /// Expected sequence number.
        expected: u64,
        /// Received sequence number.
        received: u64,
    },
}

impl SequenceResult {
    /// Classifies a received sequence number.
    ///
    /// # Arguments
    /// * `expected` - Next expected peer sequence number
    /// * `received` - MsgSeqNum(34) of the inbound message
    /// * `poss_dup` - PossDupFlag(43) of the inbound message
    #[must_use]
    pub fn classify(expected: SeqNum, received: SeqNum, poss_dup: bool) -> Self {
        let (expected, received) = (expected.value(), received.value());
        if received == expected {
            Self::Ok
        } else if received > expected {
            Self::Gap { expected, received }
        } else if poss_dup {
            Self::Duplicate { received }
        } else {
            Self::TooLow { expected, received }
        }
    }

    /// Returns true if the sequence is valid.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Returns true if there's a gap.
    #[must_use]
    pub const fn is_gap(&self) -> bool {
        matches!(self, Self::Gap { .. })
    }

    /// Returns true if the sequence is too low.
    #[must_use]
    pub const fn is_too_low(&self) -> bool {
        matches!(self, Self::TooLow { .. })
    }
}
