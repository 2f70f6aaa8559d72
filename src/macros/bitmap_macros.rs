/// Read bit `index` of a byte bitmap, least significant bit first
#[macro_export]
macro_rules! bitmap_get {
    ($bitmap:expr, $index:expr) => {{
        let index: usize = $index;
        (($bitmap[index / 8] >> (index % 8)) & 1) == 1
    }};
}

/// Set or clear bit `index` of a byte bitmap, least significant bit first
#[macro_export]
macro_rules! bitmap_set {
    ($bitmap:expr, $index:expr, $value:expr) => {{
        let index: usize = $index;
        if $value {
            $bitmap[index / 8] |= 1u8 << (index % 8);
        } else {
            $bitmap[index / 8] &= !(1u8 << (index % 8));
        }
    }};
}
