//! NVMe completion status.

use crate::error::{Error, Result};

/// Completion status of one command: status code type and status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Status {
    /// Status code type
    pub sct: u8,
    /// Status code
    pub sc: u8,
}

impl Status {
    /// Successful completion.
    pub const SUCCESS: Status = Status::generic(0x00);
    /// Invalid field in command.
    pub const INVALID_FIELD: Status = Status::generic(0x02);
    /// Data transfer error.
    pub const DATA_TRANSFER_ERROR: Status = Status::generic(0x04);
    /// Internal device error.
    pub const INTERNAL_DEVICE_ERROR: Status = Status::generic(0x06);
    /// Command aborted by request.
    pub const ABORTED_BY_REQUEST: Status = Status::generic(0x07);
    /// LBA out of range.
    pub const LBA_OUT_OF_RANGE: Status = Status::generic(0x80);

    /// Generic command status (SCT 0) with the given code.
    pub const fn generic(sc: u8) -> Self {
        Self { sct: 0, sc }
    }

    /// Decode from the completion queue entry status field.
    ///
    /// Bit 0 is the phase tag; SC is in bits 1:8, SCT in bits 9:11.
    pub fn from_raw(status_raw: u16) -> Self {
        Self {
            sct: ((status_raw >> 9) & 0x7) as u8,
            sc: ((status_raw >> 1) & 0xff) as u8,
        }
    }

    /// Encode back into a status field with the phase tag cleared.
    pub fn to_raw(self) -> u16 {
        (u16::from(self.sct & 0x7) << 9) | (u16::from(self.sc) << 1)
    }

    /// True for SCT 0, SC 0.
    pub fn is_success(self) -> bool {
        self.sct == 0 && self.sc == 0
    }

    /// True for any non-success status.
    pub fn is_error(self) -> bool {
        !self.is_success()
    }

    /// Map to a `Result`.
    pub fn into_result(self) -> Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(Error::NvmeError {
                sct: self.sct,
                sc: self.sc,
            })
        }
    }
}
