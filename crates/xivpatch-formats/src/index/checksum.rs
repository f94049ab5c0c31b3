//! Segment checksum (Adler-32)

const MOD_ADLER: u32 = 65521;

/// Adler-32 over `data`: weighted sum in the high half, plain sum in the low half
pub fn adler32(data: &[u8]) -> u32 {
    let (a, b) = data.iter().fold((1u32, 0u32), |(a, b), &byte| {
        let a = (a + u32::from(byte)) % MOD_ADLER;
        let b = (b + a) % MOD_ADLER;
        (a, b)
    });
    (b << 16) | a
}
