//! Response ordering guard.
//!
//! The device numbers the responses of a job 0, 1, ..., 14, 0, ... in the
//! low nibble of the header byte. 15 is never a position; it marks a failed job.

use crate::error::{JobError, Result};
use crate::utility::protocol::{SUB_ID_ERROR, SUB_ID_MAX};

/// A sequence position in `0..=14`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubId(u8);

impl SubId {
    pub const ZERO: SubId = SubId(0);

    /// Returns `None` for the error sentinel and anything wider than a nibble.
    pub fn new(value: u8) -> Option<Self> {
        (value <= SUB_ID_MAX).then_some(SubId(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn next(self) -> Self {
        if self.0 == SUB_ID_MAX {
            SubId(0)
        } else {
            SubId(self.0 + 1)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SequenceGuard {
    expected: SubId,
}

impl SequenceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expected(&self) -> SubId {
        self.expected
    }

    pub fn reset(&mut self) {
        self.expected = SubId::ZERO;
    }

    /// Check the low nibble of a response header and move to the next position.
    pub fn validate(&mut self, received: u8) -> Result<()> {
        if received == SUB_ID_ERROR {
            return Err(JobError::DeviceError { code: None });
        }
        if received != self.expected.get() {
            return Err(JobError::OutOfOrder {
                expected: self.expected.get(),
                received,
            });
        }
        self.expected = self.expected.next();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sub_id_bounds() {
        assert_eq!(SubId::new(0), Some(SubId::ZERO));
        assert_eq!(SubId::new(14).map(SubId::get), Some(14));
        assert_eq!(SubId::new(15), None);
        assert_eq!(SubId::new(0x1F), None);
        assert_eq!(SubId::new(14).unwrap().next(), SubId::ZERO);
    }

    #[test]
    fn test_guard_wraps_after_fourteen() {
        let mut guard = SequenceGuard::new();
        for round in 0..3 {
            for nibble in 0..=14 {
                assert!(guard.validate(nibble).is_ok(), "round {round} nibble {nibble}");
            }
        }
        assert_eq!(guard.expected(), SubId::ZERO);
    }

    #[test]
    fn test_guard_rejects_repeat_and_skip() {
        let mut guard = SequenceGuard::new();
        guard.validate(0).unwrap();
        assert_eq!(
            guard.validate(0),
            Err(JobError::OutOfOrder {
                expected: 1,
                received: 0
            })
        );

        let mut guard = SequenceGuard::new();
        guard.validate(0).unwrap();
        assert!(guard.validate(2).is_err());
    }

    #[test]
    fn test_guard_failure_does_not_advance() {
        let mut guard = SequenceGuard::new();
        assert!(guard.validate(3).is_err());
        assert_eq!(guard.expected(), SubId::ZERO);
    }

    #[test]
    fn test_guard_error_sentinel() {
        let mut guard = SequenceGuard::new();
        assert_eq!(
            guard.validate(0x0F),
            Err(JobError::DeviceError { code: None })
        );
    }

    #[test]
    fn test_guard_reset() {
        let mut guard = SequenceGuard::new();
        guard.validate(0).unwrap();
        guard.validate(1).unwrap();
        guard.reset();
        assert!(guard.validate(0).is_ok());
    }

    proptest! {
        #[test]
        fn prop_in_order_never_fails(count in 0usize..200) {
            let mut guard = SequenceGuard::new();
            for i in 0..count {
                prop_assert!(guard.validate((i % 15) as u8).is_ok());
            }
        }

        #[test]
        fn prop_error_sentinel_always_fails(prefix in 0usize..40) {
            let mut guard = SequenceGuard::new();
            for i in 0..prefix {
                guard.validate((i % 15) as u8).unwrap();
            }
            prop_assert!(guard.validate(0x0F).is_err());
        }

        #[test]
        fn prop_wrong_nibble_fails(prefix in 0usize..40, nibble in 0u8..15) {
            let mut guard = SequenceGuard::new();
            for i in 0..prefix {
                guard.validate((i % 15) as u8).unwrap();
            }
            let expected = (prefix % 15) as u8;
            prop_assume!(nibble != expected);
            prop_assert!(guard.validate(nibble).is_err());
        }
    }
}
