use std::fmt;

/// Base interpretation of an [`ElementType`], independent of width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseKind {
    Signed,
    Unsigned,
    Float,
}

/// A tagged byte encoding `{signed, unsigned, float} x {8, 16, 32, 64}`,
/// plus a reserved `Void` tag meaning "same-size integer, default
/// signedness" (used by the assembler's type-inference fallback, see
/// `asm::parse`).
///
/// The wire value of each variant is stable: it is also the byte the
/// textual assembler accepts and the value embedded in an [`Instruction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ElementType {
    I8 = 0,
    I16 = 1,
    I32 = 2,
    I64 = 3,
    U8 = 4,
    U16 = 5,
    U32 = 6,
    U64 = 7,
    F32 = 8,
    F64 = 9,
    /// Tagged but not lowered anywhere in the generator (open question,
    /// carried over unresolved): accepted by comparators, execution is
    /// undefined.
    F16 = 10,
    F8 = 11,
    /// "same-size integer, default signedness" — never appears on a
    /// well-formed instruction after assembly; only as a transient
    /// default during parsing.
    Void = 255,
}

impl ElementType {
    pub const COUNT: usize = 12;

    pub fn from_byte(byte: u8) -> Option<ElementType> {
        Some(match byte {
            0 => ElementType::I8,
            1 => ElementType::I16,
            2 => ElementType::I32,
            3 => ElementType::I64,
            4 => ElementType::U8,
            5 => ElementType::U16,
            6 => ElementType::U32,
            7 => ElementType::U64,
            8 => ElementType::F32,
            9 => ElementType::F64,
            10 => ElementType::F16,
            11 => ElementType::F8,
            255 => ElementType::Void,
            _ => return None,
        })
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }

    pub fn base_kind(self) -> BaseKind {
        match self {
            ElementType::I8 | ElementType::I16 | ElementType::I32 | ElementType::I64 => {
                BaseKind::Signed
            }
            ElementType::U8 | ElementType::U16 | ElementType::U32 | ElementType::U64 => {
                BaseKind::Unsigned
            }
            ElementType::F32 | ElementType::F64 | ElementType::F16 | ElementType::F8 => {
                BaseKind::Float
            }
            ElementType::Void => BaseKind::Signed,
        }
    }

    pub fn is_float(self) -> bool {
        self.base_kind() == BaseKind::Float
    }

    pub fn is_signed(self) -> bool {
        self.base_kind() == BaseKind::Signed
    }

    /// `log2` of the element's size in bytes: 0 for 8-bit, 1 for 16-bit,
    /// 2 for 32-bit, 3 for 64-bit.
    pub fn size_log2(self) -> u32 {
        match self {
            ElementType::I8 | ElementType::U8 | ElementType::F8 => 0,
            ElementType::I16 | ElementType::U16 | ElementType::F16 => 1,
            ElementType::I32 | ElementType::U32 | ElementType::F32 => 2,
            ElementType::I64 | ElementType::U64 | ElementType::F64 => 3,
            ElementType::Void => 2,
        }
    }

    pub fn size_bytes(self) -> u32 {
        1 << self.size_log2()
    }

    pub fn size_bits(self) -> u32 {
        self.size_bytes() * 8
    }

    /// Number of lanes a 128-bit vector register holds for this element
    /// type.
    pub fn lanes(self) -> u32 {
        16 / self.size_bytes()
    }

    /// Same-size signed integer variant (`F32 -> I32`, `U16 -> I16`, ...).
    pub fn to_signed(self) -> ElementType {
        match self.size_log2() {
            0 => ElementType::I8,
            1 => ElementType::I16,
            2 => ElementType::I32,
            _ => ElementType::I64,
        }
    }

    /// Same-size unsigned integer variant.
    pub fn to_unsigned(self) -> ElementType {
        match self.size_log2() {
            0 => ElementType::U8,
            1 => ElementType::U16,
            2 => ElementType::U32,
            _ => ElementType::U64,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementType::I8 => "i8",
            ElementType::I16 => "i16",
            ElementType::I32 => "i32",
            ElementType::I64 => "i64",
            ElementType::U8 => "u8",
            ElementType::U16 => "u16",
            ElementType::U32 => "u32",
            ElementType::U64 => "u64",
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
            ElementType::F16 => "f16",
            ElementType::F8 => "f8",
            ElementType::Void => "void",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_round_trip() {
        for byte in 0..=11u8 {
            let ty = ElementType::from_byte(byte).expect("valid tag");
            assert_eq!(ty.to_byte(), byte);
        }
        assert_eq!(ElementType::from_byte(255), Some(ElementType::Void));
        assert_eq!(ElementType::from_byte(12), None);
    }

    #[test]
    fn same_size_conversions_preserve_width() {
        assert_eq!(ElementType::F32.to_signed(), ElementType::I32);
        assert_eq!(ElementType::U16.to_signed(), ElementType::I16);
        assert_eq!(ElementType::I8.to_unsigned(), ElementType::U8);
    }

    #[test]
    fn lane_counts_match_a_128_bit_register() {
        assert_eq!(ElementType::I8.lanes(), 16);
        assert_eq!(ElementType::I16.lanes(), 8);
        assert_eq!(ElementType::I32.lanes(), 4);
        assert_eq!(ElementType::I64.lanes(), 2);
    }
}
