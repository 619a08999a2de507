//! Fixed-width integer types.

use std::fmt;

use serde::Serialize;

/// The type of a program variable or of a symbolic value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
  Bool,
  I8,
  I16,
  I32,
  I64,
  U8,
  U16,
  U32,
  U64,
}

impl Type {
  /// Width in bits. Booleans count as one bit.
  pub fn bits(self) -> u32 {
    match self {
      Type::Bool => 1,
      Type::I8 | Type::U8 => 8,
      Type::I16 | Type::U16 => 16,
      Type::I32 | Type::U32 => 32,
      Type::I64 | Type::U64 => 64,
    }
  }

  pub fn is_signed(self) -> bool {
    matches!(self, Type::I8 | Type::I16 | Type::I32 | Type::I64)
  }

  pub fn is_integer(self) -> bool {
    self != Type::Bool
  }

  /// Smallest representable value.
  pub fn min(self) -> i128 {
    match self {
      Type::Bool => 0,
      t if t.is_signed() => -(1i128 << (t.bits() - 1)),
      _ => 0,
    }
  }

  /// Largest representable value.
  pub fn max(self) -> i128 {
    match self {
      Type::Bool => 1,
      t if t.is_signed() => (1i128 << (t.bits() - 1)) - 1,
      t => (1i128 << t.bits()) - 1,
    }
  }

  pub fn contains(self, v: i128) -> bool {
    self.min() <= v && v <= self.max()
  }

  /// Reduce an arbitrary integer modulo 2^bits into the range of `self`.
  pub fn wrap(self, v: i128) -> i128 {
    let bits = self.bits();
    let modulus = 1i128 << bits;
    let low = v.rem_euclid(modulus);
    if self.is_signed() && low > self.max() {
      low - modulus
    } else {
      low
    }
  }

  /// Interpret the low `bits` bits of a raw bit pattern.
  pub fn from_bits(self, raw: u64) -> i128 {
    self.wrap(raw as i128)
  }

  /// Two's complement bit pattern of `v`, which must be in range.
  pub fn to_bits(self, v: i128) -> u64 {
    (v.rem_euclid(1i128 << self.bits())) as u64
  }

  pub fn name(self) -> &'static str {
    match self {
      Type::Bool => "bool",
      Type::I8 => "i8",
      Type::I16 => "i16",
      Type::I32 => "i32",
      Type::I64 => "i64",
      Type::U8 => "u8",
      Type::U16 => "u16",
      Type::U32 => "u32",
      Type::U64 => "u64",
    }
  }
}

impl fmt::Display for Type {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}
