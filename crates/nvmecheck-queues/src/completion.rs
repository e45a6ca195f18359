use crate::COMPLETION_BYTES;

/// Decoded completion status field (dword 3 bits 31:17 plus DNR).
///
/// Stored in the same packed form the wire uses, with the phase tag (bit 0)
/// masked out: bit 14 = do-not-retry, bits 11:9 = status code type,
/// bits 8:1 = status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status(u16);

impl Status {
    pub const SUCCESS: Status = Status::new(0, 0, false);
    pub const INVALID_OPCODE: Status = Status::new(0, 0x01, true);
    pub const INVALID_FIELD: Status = Status::new(0, 0x02, true);
    pub const INVALID_NAMESPACE: Status = Status::new(0, 0x0b, true);
    pub const LBA_OUT_OF_RANGE: Status = Status::new(0, 0x80, true);

    pub const fn new(sct: u8, sc: u8, dnr: bool) -> Self {
        let mut val = ((sc as u16) << 1) | (((sct & 0x7) as u16) << 9);
        if dnr {
            val |= 1 << 14;
        }
        Status(val)
    }

    /// Reconstructs a status from the packed wire form (phase bit ignored).
    pub const fn from_raw(raw: u16) -> Self {
        Status(raw & !1)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn status_code(self) -> u8 {
        (self.0 >> 1) as u8
    }

    pub const fn status_code_type(self) -> u8 {
        ((self.0 >> 9) & 0x7) as u8
    }

    pub const fn do_not_retry(self) -> bool {
        self.0 & (1 << 14) != 0
    }

    pub const fn is_success(self) -> bool {
        self.status_code_type() == 0 && self.status_code() == 0
    }

    /// Packs the status together with a phase tag for posting to a ring.
    pub const fn with_phase(self, phase: bool) -> u16 {
        self.0 | phase as u16
    }
}

/// One parsed 16-byte completion entry.
#[derive(Debug, Clone, Copy)]
pub struct CompletionEntry {
    /// Command-specific result dword.
    pub dw0: u32,
    /// Submission queue head pointer at completion time.
    pub sq_head: u16,
    /// Originating submission queue.
    pub sq_id: u16,
    /// Identifier of the command this entry completes.
    pub cid: u16,
    pub status: Status,
    /// Phase tag as posted; used by the reap path to tell new from stale.
    pub phase: bool,
}

impl CompletionEntry {
    pub fn parse(bytes: [u8; COMPLETION_BYTES]) -> Self {
        let dw0 = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let dw2 = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        let dw3 = u32::from_le_bytes(bytes[12..16].try_into().unwrap());
        let status_phase = (dw3 >> 16) as u16;
        Self {
            dw0,
            sq_head: (dw2 & 0xffff) as u16,
            sq_id: (dw2 >> 16) as u16,
            cid: (dw3 & 0xffff) as u16,
            status: Status::from_raw(status_phase),
            phase: status_phase & 1 != 0,
        }
    }

    /// Encodes an entry for posting; used by device models.
    pub fn to_bytes(self) -> [u8; COMPLETION_BYTES] {
        let mut out = [0u8; COMPLETION_BYTES];
        out[0..4].copy_from_slice(&self.dw0.to_le_bytes());
        let dw2 = ((self.sq_id as u32) << 16) | self.sq_head as u32;
        out[8..12].copy_from_slice(&dw2.to_le_bytes());
        let dw3 = ((self.status.with_phase(self.phase) as u32) << 16) | self.cid as u32;
        out[12..16].copy_from_slice(&dw3.to_le_bytes());
        out
    }
}
