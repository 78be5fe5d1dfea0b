// SPDX-License-Identifier: MIT
//! Rolling CRC-32 with algebraic state combination
//!
//! The token stream is checksummed incrementally as it is flushed, while the
//! header, string table and offset index are only known at finalize time.
//! `combine` merges the two without re-reading either range: appending one
//! zero byte to a CRC state is a linear map over GF(2), so shifting a state
//! past `len` bytes is that 32x32 bit matrix raised to the `len`-th power
//! (square-and-multiply, one squaring per bit of `len`).
//!
//! States are raw zero-initialized registers; [`finish`] applies the
//! conventional final one's complement for the trailer field.

use once_cell::sync::Lazy;

/// Reflected CRC-32 polynomial
const POLYNOMIAL: u32 = 0xEDB8_8320;

static CRC_TABLE: Lazy<[u32; 256]> = Lazy::new(|| {
    let mut table = [0u32; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let mut value = i as u32;
        for _ in 0..8 {
            value = if value & 1 != 0 {
                POLYNOMIAL ^ (value >> 1)
            } else {
                value >> 1
            };
        }
        *entry = value;
    }
    table
});

/// Incremental CRC-32 state
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    /// Start from the zero state.
    pub fn new() -> Self {
        Self { state: 0 }
    }

    /// Fold `bytes` into the running state.
    pub fn update(&mut self, bytes: &[u8]) {
        let mut state = self.state;
        for &byte in bytes {
            state = CRC_TABLE[((state ^ byte as u32) & 0xFF) as usize] ^ (state >> 8);
        }
        self.state = state;
    }

    /// The raw register value. Combinable, not yet finalized.
    pub fn state(&self) -> u32 {
        self.state
    }

    /// One-shot convenience over a single slice.
    pub fn checksum_state(bytes: &[u8]) -> u32 {
        let mut crc = Self::new();
        crc.update(bytes);
        crc.state()
    }

    /// Combine two independently computed states.
    ///
    /// `state_a` is the state after processing some prefix; `state_b` is the
    /// state of the suffix processed on its own from the zero state; `len_b`
    /// is the suffix length in bytes. Returns the state as if prefix and
    /// suffix had been processed in one pass.
    pub fn combine(state_a: u32, state_b: u32, len_b: u64) -> u32 {
        if len_b == 0 {
            return state_a ^ state_b;
        }

        // T^8: advance a state by one zero byte.
        let mut mat = [0u32; 32];
        for (i, row) in mat.iter_mut().enumerate() {
            let c = 1u32 << i;
            *row = CRC_TABLE[(c & 0xFF) as usize] ^ (c >> 8);
        }

        // Identity, then resultant = (T^8)^len_b by square-and-multiply.
        let mut result = [0u32; 32];
        for (i, row) in result.iter_mut().enumerate() {
            *row = 1u32 << i;
        }
        let mut n = len_b;
        while n > 0 {
            if n & 1 == 1 {
                result = gf2_matrix_multiply(&mat, &result);
            }
            n >>= 1;
            if n > 0 {
                mat = gf2_matrix_multiply(&mat, &mat);
            }
        }

        gf2_matrix_times(&result, state_a) ^ state_b
    }
}

/// Final trailer value for a combined state: conventional xor-out.
pub fn finish(state: u32) -> u32 {
    !state
}

/// Matrix-vector product over GF(2): XOR the rows selected by set bits.
fn gf2_matrix_times(mat: &[u32; 32], vec: u32) -> u32 {
    let mut sum = 0;
    let mut v = vec;
    let mut idx = 0;
    while v != 0 {
        if v & 1 != 0 {
            sum ^= mat[idx];
        }
        v >>= 1;
        idx += 1;
    }
    sum
}

fn gf2_matrix_multiply(left: &[u32; 32], right: &[u32; 32]) -> [u32; 32] {
    let mut dest = [0u32; 32];
    for (i, row) in dest.iter_mut().enumerate() {
        *row = gf2_matrix_times(left, right[i]);
    }
    dest
}
