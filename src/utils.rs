//! Internal module providing handy little-endian primitive reads and the
//! A1 column-name encoder shared by the record decoders.

use byteorder::{ByteOrder, LittleEndian};

/// Reads a little-endian `u16` from the start of `s`.
pub fn read_u16(s: &[u8]) -> u16 {
    LittleEndian::read_u16(s)
}

/// Reads a little-endian `u32` from the start of `s`.
pub fn read_u32(s: &[u8]) -> u32 {
    LittleEndian::read_u32(s)
}

/// Reads a little-endian `i32` from the start of `s`.
pub fn read_i32(s: &[u8]) -> i32 {
    LittleEndian::read_i32(s)
}

/// Reads a little-endian `u32` and casts it to `usize`.
pub fn read_usize(s: &[u8]) -> usize {
    read_u32(s) as usize
}

/// Reads a little-endian IEEE-754 `f64` from the start of `s`.
pub fn read_f64(s: &[u8]) -> f64 {
    LittleEndian::read_f64(s)
}

/// Appends the A1 column name for a 0-based column index to `col`.
///
/// `letters(n)` in the design notes: base-26 with no zero digit, so
/// `push_column(0, ..)` yields `"A"`, `push_column(25, ..)` yields `"Z"`,
/// `push_column(26, ..)` yields `"AA"`.
pub fn push_column(mut col: u32, s: &mut String) {
    col += 1;
    let mut digits = Vec::with_capacity(4);
    while col > 0 {
        let rem = (col - 1) % 26;
        digits.push((b'A' + rem as u8) as char);
        col = (col - 1) / 26;
    }
    s.extend(digits.iter().rev());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_bijection() {
        let mut s = String::new();
        push_column(0, &mut s);
        assert_eq!(s, "A");

        let mut s = String::new();
        push_column(25, &mut s);
        assert_eq!(s, "Z");

        let mut s = String::new();
        push_column(26, &mut s);
        assert_eq!(s, "AA");

        let mut s = String::new();
        push_column(701, &mut s);
        assert_eq!(s, "ZZ");

        let mut s = String::new();
        push_column(702, &mut s);
        assert_eq!(s, "AAA");

        let mut s = String::new();
        push_column(16383, &mut s);
        assert_eq!(s, "XFD");
    }
}
