#![allow(dead_code)]

// The few ASCII bytes the text parsers refer to by name.
pub const HT: u8 = 0x09; // horizontal tab
pub const LF: u8 = 0x0A;
pub const CR: u8 = 0x0D;
pub const SP: u8 = 0x20; // space
pub const EXCLAMATION: u8 = 0x21; // !
pub const ASTERISK: u8 = 0x2A; // *
pub const PLUS: u8 = 0x2B; // +
pub const MINUS: u8 = 0x2D; // -
pub const SLASH: u8 = 0x2F; // /
pub const EQ: u8 = 0x3D; // =
pub const QUESTION: u8 = 0x3F; // ?
pub const UNDERSCORE: u8 = 0x5F; // _
