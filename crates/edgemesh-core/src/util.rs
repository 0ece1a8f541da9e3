//! Small buffer helpers shared by edge and supernode code

use rand::RngCore;

/// Fill `buf` with bytes from the process RNG.
pub fn fill_random(buf: &mut [u8]) {
    rand::thread_rng().fill_bytes(buf);
}

/// XOR `src` into `dst` in place. Whichever slice is longer is left
/// untouched past the common prefix.
pub fn xor_slices(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_random_fills() {
        let mut buf = [0u8; 64];
        fill_random(&mut buf);
        // 64 zero bytes from a working RNG is a once-per-universe event
        assert_ne!(buf, [0u8; 64]);
    }

    #[test]
    fn test_xor_round_trip() {
        let mut data = *b"community-name--";
        let pad = [0x5Au8; 16];
        xor_slices(&mut data, &pad);
        assert_ne!(&data, b"community-name--");
        xor_slices(&mut data, &pad);
        assert_eq!(&data, b"community-name--");
    }

    #[test]
    fn test_xor_stops_at_common_prefix() {
        let mut data = [0xFFu8; 4];
        xor_slices(&mut data, &[0x0F, 0x0F]);
        assert_eq!(data, [0xF0, 0xF0, 0xFF, 0xFF]);
    }
}
