//! Incremental one's-complement checksum updates (RFC 1071 / RFC 1624).
//!
//! Rewriting an address in an IPv4 packet only changes a handful of 16-bit words that
//! participate in the IP header checksum and in the TCP/UDP pseudo-header checksum. Instead
//! of re-summing the whole packet, the difference between the old and the new words is
//! collected in an [`Accumulator`] and folded into the stored checksum with
//! [`Accumulator::adjust`].
//!
//! The arithmetic follows the `ADD_CHECKSUM_32`, `SUB_CHECKSUM_32` and `ADJUST_CHECKSUM`
//! macros from OpenVPN bit for bit, including the asymmetric handling of negative sums.
//!
//! ```
//! use qtun_wire::checksum::Accumulator;
//!
//! let mut header = [
//!     0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0xb8, 0x61, 0xc0, 0xa8,
//!     0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
//! ];
//!
//! let mut acc = Accumulator::new();
//! acc.accumulate(&header[12..16], false);
//! header[12..16].copy_from_slice(&[10, 0, 0, 2]);
//! acc.accumulate(&header[12..16], true);
//! acc.adjust(&mut header[10..12]);
//!
//! assert_eq!(&header[10..12], &[0x6f, 0x09]);
//! ```

/// Signed running delta between the words removed from and added to a checksummed region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accumulator(i32);

impl Accumulator {
    /// Creates an empty accumulator.
    pub const fn new() -> Self {
        Self(0)
    }

    /// Returns the raw accumulated delta.
    pub const fn value(self) -> i32 {
        self.0
    }

    /// Folds every 4-byte word of `region` into the accumulator, split into its high and low
    /// 16-bit halves.
    ///
    /// Old data (about to be overwritten) is added with `subtract == false`, new data is
    /// removed with `subtract == true`. Trailing bytes that do not form a full word are
    /// ignored; callers only ever pass IPv4 addresses.
    pub fn accumulate(&mut self, region: &[u8], subtract: bool) {
        for word in region.chunks_exact(4) {
            let word = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
            let low = (word & 0xFFFF) as i32;
            let high = (word >> 16) as i32;

            if subtract {
                self.0 -= low;
                self.0 -= high;
            } else {
                self.0 += low;
                self.0 += high;
            }
        }
    }

    /// Applies the accumulated delta to the big-endian checksum stored in `field`.
    ///
    /// # Panics
    /// Panics if `field` is shorter than 2 bytes.
    pub fn adjust(self, field: &mut [u8]) {
        let checksum = u16::from_be_bytes([field[0], field[1]]);

        let acc = self.0 + i32::from(checksum);
        let checksum = if acc < 0 { !fold(-acc) } else { fold(acc) };

        field[..2].copy_from_slice(&checksum.to_be_bytes());
    }
}

/// Adds the high 16 bits into the low 16 bits, then adds the resulting carry once more.
#[inline]
const fn fold(mut acc: i32) -> u16 {
    acc = (acc >> 16) + (acc & 0xFFFF);
    acc += acc >> 16;
    acc as u16
}
