//! Metadata tokens carried over from the native binary's metadata.
//!
//! A [`Token`] is the 32-bit identifier the IL2CPP metadata assigns to every
//! type, method and field definition. The initialization machinery embeds
//! method tokens into generated code so that the native runtime can resolve a
//! method handle without a signature search. A method without a token (for
//! example one synthesized by the compiler back-end and never written to the
//! metadata tables) uses [`Token::NULL`] and falls back to the slower lookup.
//!
//! The high byte selects the metadata table, the low 24 bits the row:
//!
//! ```text
//! 0x06 00 0042
//!   |   \____/
//!   |    row
//!  table (MethodDef)
//! ```

use std::fmt;

/// A metadata token.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Token(pub u32);

impl Token {
    /// The null token, used for members that do not exist in the metadata tables.
    pub const NULL: Token = Token(0);

    /// Table id of `TypeDef` rows.
    pub const TABLE_TYPE_DEF: u8 = 0x02;
    /// Table id of `Field` rows.
    pub const TABLE_FIELD: u8 = 0x04;
    /// Table id of `MethodDef` rows.
    pub const TABLE_METHOD_DEF: u8 = 0x06;

    /// Creates a token from its raw value.
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Builds a token from a table id and a 1-based row.
    #[must_use]
    pub fn from_parts(table: u8, row: u32) -> Self {
        Token((u32::from(table) << 24) | (row & 0x00FF_FFFF))
    }

    /// Returns the raw 32-bit value.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Returns the table id stored in the high byte.
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Returns the row stored in the low 24 bits.
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns `true` for the null token.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the token addresses the `MethodDef` table.
    #[must_use]
    pub fn is_method_def(&self) -> bool {
        self.table() == Self::TABLE_METHOD_DEF
    }

    /// The token reinterpreted as the signed immediate pushed by `ldc.i4`.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn as_immediate(&self) -> i32 {
        self.0 as i32
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_parts() {
        let token = Token::from_parts(Token::TABLE_METHOD_DEF, 0x42);
        assert_eq!(token.value(), 0x0600_0042);
        assert_eq!(token.table(), 0x06);
        assert_eq!(token.row(), 0x42);
        assert!(token.is_method_def());
    }

    #[test]
    fn test_token_row_is_masked() {
        let token = Token::from_parts(Token::TABLE_FIELD, 0x0100_0001);
        assert_eq!(token.table(), Token::TABLE_FIELD);
        assert_eq!(token.row(), 1);
    }

    #[test]
    fn test_token_null() {
        assert!(Token::NULL.is_null());
        assert!(Token::default().is_null());
        assert!(!Token(0x0600_0001).is_null());
        assert!(!Token::NULL.is_method_def());
    }

    #[test]
    fn test_token_immediate() {
        assert_eq!(Token(0x0600_0001).as_immediate(), 0x0600_0001);
        assert_eq!(Token(0xFFFF_FFFF).as_immediate(), -1);
    }

    #[test]
    fn test_token_conversions() {
        let token: Token = 0x0200_0005u32.into();
        assert_eq!(token.table(), Token::TABLE_TYPE_DEF);
        let raw: u32 = token.into();
        assert_eq!(raw, 0x0200_0005);
    }

    #[test]
    fn test_token_formatting() {
        let token = Token(0x0600_0001);
        assert_eq!(format!("{token}"), "0x06000001");
        let debug = format!("{token:?}");
        assert!(debug.contains("Token(0x06000001"));
        assert!(debug.contains("table: 0x06"));
        assert!(debug.contains("row: 1"));
    }

    #[test]
    fn test_token_ordering() {
        let mut tokens = [Token(0x0600_0003), Token(0x0600_0001), Token(0x0200_0001)];
        tokens.sort();
        assert_eq!(tokens[0], Token(0x0200_0001));
        assert_eq!(tokens[2], Token(0x0600_0003));
    }
}
