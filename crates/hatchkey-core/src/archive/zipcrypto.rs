//! Traditional PKWARE stream cipher ("ZipCrypto").
//!
//! The cipher state is three 32-bit keys. Each plaintext byte is folded into
//! the keys through the CRC-32 polynomial and a linear congruential step, and
//! the keystream byte is derived from the third key. Every encrypted entry is
//! prefixed with a 12-byte header whose last plaintext byte is a check byte,
//! which is what makes rejecting a wrong password cost only a few table
//! lookups.

/// Size of the per-entry encryption header
pub const ENCRYPTION_HEADER_LEN: usize = 12;

const KEY0_INIT: u32 = 0x1234_5678;
const KEY1_INIT: u32 = 0x2345_6789;
const KEY2_INIT: u32 = 0x3456_7890;
const LCG_MULTIPLIER: u32 = 134_775_813;

/// Reflected CRC-32 (IEEE 802.3) lookup table
static CRC_TABLE: [u32; 256] = build_crc_table();

const fn build_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

/// One CRC-32 step without the pre/post inversion
#[inline(always)]
pub(crate) fn crc32_step(crc: u32, byte: u8) -> u32 {
    CRC_TABLE[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8)
}

/// Cipher state for one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keys {
    k0: u32,
    k1: u32,
    k2: u32,
}

impl Keys {
    /// Initializes the keys from a password
    #[inline]
    pub fn new(password: &[u8]) -> Self {
        let mut keys = Self {
            k0: KEY0_INIT,
            k1: KEY1_INIT,
            k2: KEY2_INIT,
        };
        for &b in password {
            keys.update(b);
        }
        keys
    }

    #[inline(always)]
    fn update(&mut self, plain: u8) {
        self.k0 = crc32_step(self.k0, plain);
        self.k1 = self
            .k1
            .wrapping_add(self.k0 & 0xFF)
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(1);
        self.k2 = crc32_step(self.k2, (self.k1 >> 24) as u8);
    }

    #[inline(always)]
    fn keystream(&self) -> u8 {
        let t = (self.k2 | 2) & 0xFFFF;
        (t.wrapping_mul(t ^ 1) >> 8) as u8
    }

    /// Decrypts one byte and advances the state
    #[inline(always)]
    pub fn decrypt_byte(&mut self, cipher: u8) -> u8 {
        let plain = cipher ^ self.keystream();
        self.update(plain);
        plain
    }

    /// Encrypts one byte and advances the state
    #[inline(always)]
    pub fn encrypt_byte(&mut self, plain: u8) -> u8 {
        let cipher = plain ^ self.keystream();
        self.update(plain);
        cipher
    }

    /// Decrypts `buf` in place
    pub fn decrypt_in_place(&mut self, buf: &mut [u8]) {
        for b in buf {
            *b = self.decrypt_byte(*b);
        }
    }

    /// Encrypts `buf` in place
    pub fn encrypt_in_place(&mut self, buf: &mut [u8]) {
        for b in buf {
            *b = self.encrypt_byte(*b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_table_matches_standard_crc32() {
        let data = b"123456789";
        let crc = !data.iter().fold(!0u32, |crc, &b| crc32_step(crc, b));
        assert_eq!(crc, 0xCBF4_3926);

        let mut reference = flate2::Crc::new();
        reference.update(b"hatchkey");
        let ours = !b"hatchkey".iter().fold(!0u32, |crc, &b| crc32_step(crc, b));
        assert_eq!(ours, reference.sum());
    }

    #[test]
    fn test_empty_password_keeps_initial_keys() {
        let keys = Keys::new(b"");
        assert_eq!(keys, Keys { k0: KEY0_INIT, k1: KEY1_INIT, k2: KEY2_INIT });
        assert_ne!(Keys::new(b"a"), keys);
    }

    #[test]
    fn test_decrypt_inverts_encrypt() {
        let plain = b"emergency storage key".to_vec();
        let mut buf = plain.clone();

        Keys::new(b"7k2p").encrypt_in_place(&mut buf);
        assert_ne!(buf, plain);

        let mut wrong = buf.clone();
        Keys::new(b"7k2q").decrypt_in_place(&mut wrong);
        assert_ne!(wrong, plain);

        Keys::new(b"7k2p").decrypt_in_place(&mut buf);
        assert_eq!(buf, plain);
    }
}
