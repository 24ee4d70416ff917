//! NVM command set encoding.
//!
//! Only the dwords this layer fills are modelled; the transport owns the
//! remaining submission queue entry fields (command id, PRP/SGL pointers).

use bitflags::bitflags;

/// Maximum number of ranges in one dataset management command.
pub const DSM_MAX_RANGES: usize = 256;

/// Dataset management attribute: deallocate (AD, cdw11 bit 2).
pub const DSM_ATTR_DEALLOCATE: u32 = 1 << 2;

/// Largest block count one read/write can encode (16-bit 0's based NLB).
pub const MAX_LBA_COUNT_PER_CMD: u32 = 1 << 16;

const NLB_MASK: u32 = 0xffff;

/// NVM command set opcodes issued by this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Commit volatile write cache to media.
    Flush = 0x00,
    /// Write logical blocks.
    Write = 0x01,
    /// Read logical blocks.
    Read = 0x02,
    /// Dataset management (deallocate / TRIM).
    DatasetManagement = 0x09,
}

impl Opcode {
    /// Whether the command moves logical block data and may be split.
    pub fn is_rw(self) -> bool {
        match self {
            Opcode::Read | Opcode::Write => true,
            Opcode::Flush | Opcode::DatasetManagement => false,
        }
    }
}

impl From<Opcode> for u8 {
    fn from(opc: Opcode) -> u8 {
        opc as u8
    }
}

bitflags! {
    /// Per-command I/O flags, encoded in the upper bits of cdw12.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct IoFlags: u32 {
        /// Force unit access: data reaches media before completion.
        const FUA = 1 << 30;
        /// Controller applies limited retry effort.
        const LIMITED_RETRY = 1 << 31;
    }
}

/// One NVMe dataset management range descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct DsmRange {
    /// Context attributes.
    pub attributes: u32,
    /// Length in logical blocks.
    pub length: u32,
    /// First logical block.
    pub starting_lba: u64,
}

impl DsmRange {
    /// Range of `length` blocks starting at `starting_lba`, no context attributes.
    pub fn new(starting_lba: u64, length: u32) -> Self {
        Self {
            attributes: 0,
            length,
            starting_lba,
        }
    }
}

/// Submission queue entry fields filled by the namespace command builders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NvmeCmd {
    /// Opcode
    pub opc: Opcode,
    /// Namespace identifier
    pub nsid: u32,
    /// Command dword 10
    pub cdw10: u32,
    /// Command dword 11
    pub cdw11: u32,
    /// Command dword 12
    pub cdw12: u32,
}

impl NvmeCmd {
    /// Command with only opcode and namespace set.
    pub fn new(opc: Opcode, nsid: u32) -> Self {
        Self {
            opc,
            nsid,
            cdw10: 0,
            cdw11: 0,
            cdw12: 0,
        }
    }

    /// Read or write of `lba_count` blocks at `lba`.
    ///
    /// A zero `lba_count` encodes as a single block; callers are expected
    /// not to issue empty transfers.
    pub fn rw(opc: Opcode, nsid: u32, lba: u64, lba_count: u32, flags: IoFlags) -> Self {
        debug_assert!(opc.is_rw());
        debug_assert!(lba_count <= MAX_LBA_COUNT_PER_CMD);
        Self {
            opc,
            nsid,
            cdw10: lba as u32,
            cdw11: (lba >> 32) as u32,
            cdw12: (lba_count.saturating_sub(1) & NLB_MASK) | flags.bits(),
        }
    }

    /// Dataset management deallocate over `num_ranges` ranges.
    pub fn deallocate(nsid: u32, num_ranges: usize) -> Self {
        debug_assert!((1..=DSM_MAX_RANGES).contains(&num_ranges));
        Self {
            opc: Opcode::DatasetManagement,
            nsid,
            cdw10: (num_ranges - 1) as u32,
            cdw11: DSM_ATTR_DEALLOCATE,
            cdw12: 0,
        }
    }

    /// Starting LBA of a read/write (cdw10/cdw11).
    pub fn slba(&self) -> u64 {
        u64::from(self.cdw10) | (u64::from(self.cdw11) << 32)
    }

    /// 0's based number of logical blocks of a read/write.
    pub fn nlb(&self) -> u32 {
        self.cdw12 & NLB_MASK
    }

    /// I/O flags of a read/write.
    pub fn io_flags(&self) -> IoFlags {
        IoFlags::from_bits_truncate(self.cdw12)
    }
}
