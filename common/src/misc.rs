pub trait IsEven: Copy {
    #[allow(clippy::wrong_self_convention)]
    fn is_even(self) -> bool;
}

impl IsEven for u16 {
    fn is_even(self) -> bool {
        self & 0x1 != 1
    }
}

impl IsEven for u8 {
    fn is_even(self) -> bool {
        self & 0x1 != 1
    }
}

////////////////////////////////////////////////////////////////////////////////

// Sign extend the low 4 bits to 16.
pub fn sext4(nibble: u16) -> u16 {
    (((nibble << 12) as i16) >> 12) as u16
}
