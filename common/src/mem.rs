use bytemuck::cast_slice;

// TaC is big-endian: the high byte of a word lives at the even address.
pub fn words_to_bytes(words: &[u16]) -> Vec<u8> {
    let be: Vec<u16> = words.iter().map(|w| w.to_be()).collect();
    cast_slice::<u16, u8>(&be).to_vec()
}
