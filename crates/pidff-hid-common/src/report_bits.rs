//! Bit-level HID report assembly and disassembly
//!
//! HID fields are packed least-significant bit first, without regard to byte
//! boundaries. Offsets used here count from the first bit after the report
//! id byte.

use crate::{HidCommonError, HidCommonResult};

/// Largest field this codec moves in one call.
pub const MAX_FIELD_BITS: u32 = 32;

fn check_size(bit_size: u32) -> HidCommonResult<()> {
    if bit_size == 0 || bit_size > MAX_FIELD_BITS {
        return Err(HidCommonError::InvalidReport(format!(
            "field size {bit_size} not in 1..={MAX_FIELD_BITS}"
        )));
    }
    Ok(())
}

fn out_of_bounds(bit_offset: u32, bit_size: u32, len: usize) -> HidCommonError {
    HidCommonError::InvalidReport(format!(
        "bits {bit_offset}..{} exceed {len}-byte payload",
        u64::from(bit_offset) + u64::from(bit_size)
    ))
}

/// Mask covering the low `bit_size` bits.
pub fn field_mask(bit_size: u32) -> u32 {
    if bit_size >= 32 {
        u32::MAX
    } else {
        (1u32 << bit_size) - 1
    }
}

/// Payload bytes needed for `bit_len` bits.
pub fn payload_len(bit_len: u32) -> usize {
    bit_len.div_ceil(8) as usize
}

/// Builds one report: the id byte followed by a zeroed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportWriter {
    buffer: Vec<u8>,
}

impl ReportWriter {
    /// `len` is the full report length including the id byte.
    pub fn new(report_id: u8, len: usize) -> Self {
        let mut buffer = vec![0u8; len.max(1)];
        if let Some(first) = buffer.first_mut() {
            *first = report_id;
        }
        Self { buffer }
    }

    pub fn report_id(&self) -> u8 {
        self.buffer.first().copied().unwrap_or(0)
    }

    /// Stores the low `bit_size` bits of `raw` at `bit_offset`.
    pub fn set_bits(&mut self, bit_offset: u32, bit_size: u32, raw: u32) -> HidCommonResult<&mut Self> {
        check_size(bit_size)?;
        let payload_len = self.buffer.len().saturating_sub(1);
        for i in 0..bit_size {
            let pos = bit_offset
                .checked_add(i)
                .ok_or_else(|| out_of_bounds(bit_offset, bit_size, payload_len))?;
            let byte = self
                .buffer
                .get_mut(1 + (pos / 8) as usize)
                .ok_or_else(|| out_of_bounds(bit_offset, bit_size, payload_len))?;
            let mask = 1u8 << (pos % 8);
            if (raw >> i) & 1 == 1 {
                *byte |= mask;
            } else {
                *byte &= !mask;
            }
        }
        Ok(self)
    }

    /// Stores a signed value in two's complement over `bit_size` bits.
    pub fn set_signed(&mut self, bit_offset: u32, bit_size: u32, value: i32) -> HidCommonResult<&mut Self> {
        let raw = u32::from_ne_bytes(value.to_ne_bytes()) & field_mask(bit_size);
        self.set_bits(bit_offset, bit_size, raw)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

/// Reads fields out of a received report.
#[derive(Debug, Clone, Copy)]
pub struct ReportReader<'a> {
    data: &'a [u8],
}

impl<'a> ReportReader<'a> {
    /// `data` starts with the report id byte.
    pub fn new(data: &'a [u8]) -> HidCommonResult<Self> {
        if data.is_empty() {
            return Err(HidCommonError::InvalidReport("empty report".to_string()));
        }
        Ok(Self { data })
    }

    pub fn report_id(&self) -> u8 {
        self.data.first().copied().unwrap_or(0)
    }

    pub fn payload(&self) -> &'a [u8] {
        self.data.get(1..).unwrap_or(&[])
    }

    pub fn bits(&self, bit_offset: u32, bit_size: u32) -> HidCommonResult<u32> {
        check_size(bit_size)?;
        let payload = self.payload();
        let mut raw = 0u32;
        for i in 0..bit_size {
            let pos = bit_offset
                .checked_add(i)
                .ok_or_else(|| out_of_bounds(bit_offset, bit_size, payload.len()))?;
            let byte = payload
                .get((pos / 8) as usize)
                .ok_or_else(|| out_of_bounds(bit_offset, bit_size, payload.len()))?;
            if (byte >> (pos % 8)) & 1 == 1 {
                raw |= 1 << i;
            }
        }
        Ok(raw)
    }

    /// Reads a two's complement value and sign-extends it.
    pub fn signed_bits(&self, bit_offset: u32, bit_size: u32) -> HidCommonResult<i32> {
        let raw = self.bits(bit_offset, bit_size)?;
        Ok(sign_extend(raw, bit_size))
    }
}

/// Sign-extends the low `bit_size` bits of `raw`.
pub fn sign_extend(raw: u32, bit_size: u32) -> i32 {
    if bit_size == 0 || bit_size >= 32 {
        return i32::from_ne_bytes(raw.to_ne_bytes());
    }
    let shift = 32 - bit_size;
    i32::from_ne_bytes((raw << shift).to_ne_bytes()) >> shift
}
