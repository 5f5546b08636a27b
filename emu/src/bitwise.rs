use std::ops::RangeInclusive;

/// Contains some helper methods to manipulate bits,
/// the index (`bit_idx`) is supposed to be from lsb to msb (right to left)
pub trait Bits: Copy {
    /// Width of the type in bits.
    const WIDTH: u8;

    fn is_bit_on(self, bit_idx: u8) -> bool;

    fn set_bit(&mut self, bit_idx: u8, value: bool);

    fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self;

    /// Returns a sign-extended copy of the value.
    /// `number_of_bits` is the width of the two's complement value
    /// stored in the low bits.
    fn sign_extended(self, number_of_bits: u8) -> Self;

    fn get_byte(self, byte_nth: u8) -> u8;

    fn set_byte(&mut self, byte_nth: u8, value: u8);

    fn get_bit(self, bit_idx: u8) -> bool {
        self.is_bit_on(bit_idx)
    }

    fn set_bit_on(&mut self, bit_idx: u8) {
        self.set_bit(bit_idx, true);
    }

    fn set_bit_off(&mut self, bit_idx: u8) {
        self.set_bit(bit_idx, false);
    }
}

macro_rules! impl_bits {
    ($($t:ty),*) => {$(
        impl Bits for $t {
            const WIDTH: u8 = <$t>::BITS as u8;

            #[inline]
            fn is_bit_on(self, bit_idx: u8) -> bool {
                debug_assert!(bit_idx < Self::WIDTH);
                (self >> bit_idx) & 1 == 1
            }

            #[inline]
            fn set_bit(&mut self, bit_idx: u8, value: bool) {
                debug_assert!(bit_idx < Self::WIDTH);
                let mask: $t = 1 << bit_idx;
                if value {
                    *self |= mask;
                } else {
                    *self &= !mask;
                }
            }

            #[inline]
            fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self {
                let start = *bits_range.start();
                let end = *bits_range.end();
                debug_assert!(start <= end && end < Self::WIDTH);

                let length = u32::from(end - start + 1);
                let mask = <$t>::MAX.checked_shr(u32::from(Self::WIDTH) - length).unwrap_or(0);

                (self >> start) & mask
            }

            #[inline]
            fn sign_extended(self, number_of_bits: u8) -> Self {
                debug_assert!(number_of_bits > 0 && number_of_bits <= Self::WIDTH);
                let unused = Self::WIDTH - number_of_bits;

                // Sign bit goes to the i128 msb, arithmetic shift brings it back.
                let top = 128 - u32::from(Self::WIDTH);
                ((i128::from(self << unused) << top) >> (top + u32::from(unused))) as $t
            }

            #[inline]
            fn get_byte(self, byte_nth: u8) -> u8 {
                debug_assert!(byte_nth < Self::WIDTH / 8);
                (self >> (byte_nth * 8)) as u8
            }

            #[inline]
            fn set_byte(&mut self, byte_nth: u8, value: u8) {
                debug_assert!(byte_nth < Self::WIDTH / 8);
                let shift = byte_nth * 8;
                let mask: $t = !((0xFF as $t) << shift);
                *self = (*self & mask) | ((value as $t) << shift);
            }
        }
    )*};
}

impl_bits!(u8, u16, u32, u64);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    #[test]
    fn test_is_on() {
        let b = 0b1_1001_1101_u32;
        assert!(b.is_bit_on(0));
        assert!(!b.is_bit_on(1));
        assert!(b.is_bit_on(2));
        assert!(b.is_bit_on(8));
        assert!(!b.is_bit_on(31));
    }

    #[test]
    fn test_set_bit() {
        let mut b = 0b1_1001_1101_u32;
        b.set_bit_on(1);
        b.set_bit_off(0);
        b.set_bit(11, true);
        assert_eq!(b, 0b1001_1001_1110);
    }

    #[test]
    fn test_get_bits() {
        let b = 0xBEEF_u16;
        assert_eq!(b.get_bits(12..=15), 0xB);
        assert_eq!(b.get_bits(0..=3), 0xF);
        assert_eq!(b.get_bits(0..=15), 0xBEEF);
        assert_eq!(0xFFFF_FFFF_u32.get_bits(0..=31), 0xFFFF_FFFF);
        assert_eq!(0x8000_0000_u32.get_bits(31..=31), 1);
    }

    #[test]
    fn test_full_width_helpers() {
        assert_eq!(<u8 as Bits>::WIDTH, 8);
        assert_eq!(<u64 as Bits>::WIDTH, 64);
        assert_eq!(0x8000_0000_0000_0000_u64.sign_extended(64), 0x8000_0000_0000_0000);
        assert_eq!(0x8000_u16.get_bits(15..=15), 1);
        assert!(0x80_u8.is_bit_on(7));
        assert_eq!(0xAABB_u16.get_byte(1), 0xAA);
    }

    #[test]
    fn test_bytes() {
        let mut v = 0x1234_5678_u32;
        assert_eq!(v.get_byte(0), 0x78);
        assert_eq!(v.get_byte(3), 0x12);
        v.set_byte(1, 0xAB);
        assert_eq!(v, 0x1234_AB78);
    }

    #[test]
    fn test_sign_extended() {
        assert_eq!(0x80_u32.sign_extended(8), 0xFFFF_FF80);
        assert_eq!(0x7F_u32.sign_extended(8), 0x7F);
        assert_eq!(0x8000_u32.sign_extended(16), 0xFFFF_8000);
        assert_eq!(0b1001_u8.sign_extended(4), 0b1111_1001);
        assert_eq!(0x00FF_FFFF_u32.sign_extended(24), 0xFFFF_FFFF);
        assert_eq!(0xFFFF_FFFF_u32.sign_extended(32), 0xFFFF_FFFF);
    }

    #[test]
    fn test_sign_extended_matches_casts() {
        let mut rng = StdRng::seed_from_u64(0x00C1_E3E7);
        for _ in 0..1000 {
            let v: u32 = rng.r#gen();
            assert_eq!((v & 0xFF).sign_extended(8), i32::from(v as u8 as i8) as u32);
            assert_eq!((v & 0xFFFF).sign_extended(16), i32::from(v as u16 as i16) as u32);
        }
    }
}
