//! CIL opcodes (ECMA-335 Partition III).
//!
//! [`OpCode`] is a closed enum over every instruction the neutral body model
//! can carry. Single-byte opcodes encode as their byte value, two-byte opcodes
//! as `0xFE00 | second_byte`. Macro forms (`ldarg.0`, `br.s`, `ldc.i4.5`, ...)
//! are kept so that synthesized bodies can use the compact spelling, and
//! [`OpCode::expand`] turns any macro form into its general form plus the
//! operand it implied.

use strum::{EnumCount, EnumIter};

macro_rules! define_opcodes {
    ($($variant:ident = $code:literal => $mnemonic:literal,)*) => {
        /// A CIL opcode.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
        #[allow(missing_docs, non_camel_case_types)]
        pub enum OpCode {
            $($variant,)*
        }

        impl OpCode {
            /// The encoded value, `0xFE00 | b` for two-byte opcodes.
            #[must_use]
            pub fn code(self) -> u16 {
                match self {
                    $(Self::$variant => $code,)*
                }
            }

            /// The assembler mnemonic.
            #[must_use]
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Self::$variant => $mnemonic,)*
                }
            }

            /// Decodes an encoded value produced by [`OpCode::code`].
            #[must_use]
            pub fn from_code(code: u16) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

define_opcodes! {
    Nop = 0x00 => "nop",
    Break = 0x01 => "break",
    Ldarg_0 = 0x02 => "ldarg.0",
    Ldarg_1 = 0x03 => "ldarg.1",
    Ldarg_2 = 0x04 => "ldarg.2",
    Ldarg_3 = 0x05 => "ldarg.3",
    Ldloc_0 = 0x06 => "ldloc.0",
    Ldloc_1 = 0x07 => "ldloc.1",
    Ldloc_2 = 0x08 => "ldloc.2",
    Ldloc_3 = 0x09 => "ldloc.3",
    Stloc_0 = 0x0A => "stloc.0",
    Stloc_1 = 0x0B => "stloc.1",
    Stloc_2 = 0x0C => "stloc.2",
    Stloc_3 = 0x0D => "stloc.3",
    Ldarg_S = 0x0E => "ldarg.s",
    Ldarga_S = 0x0F => "ldarga.s",
    Starg_S = 0x10 => "starg.s",
    Ldloc_S = 0x11 => "ldloc.s",
    Ldloca_S = 0x12 => "ldloca.s",
    Stloc_S = 0x13 => "stloc.s",
    Ldnull = 0x14 => "ldnull",
    Ldc_I4_M1 = 0x15 => "ldc.i4.m1",
    Ldc_I4_0 = 0x16 => "ldc.i4.0",
    Ldc_I4_1 = 0x17 => "ldc.i4.1",
    Ldc_I4_2 = 0x18 => "ldc.i4.2",
    Ldc_I4_3 = 0x19 => "ldc.i4.3",
    Ldc_I4_4 = 0x1A => "ldc.i4.4",
    Ldc_I4_5 = 0x1B => "ldc.i4.5",
    Ldc_I4_6 = 0x1C => "ldc.i4.6",
    Ldc_I4_7 = 0x1D => "ldc.i4.7",
    Ldc_I4_8 = 0x1E => "ldc.i4.8",
    Ldc_I4_S = 0x1F => "ldc.i4.s",
    Ldc_I4 = 0x20 => "ldc.i4",
    Ldc_I8 = 0x21 => "ldc.i8",
    Ldc_R4 = 0x22 => "ldc.r4",
    Ldc_R8 = 0x23 => "ldc.r8",
    Dup = 0x25 => "dup",
    Pop = 0x26 => "pop",
    Jmp = 0x27 => "jmp",
    Call = 0x28 => "call",
    Calli = 0x29 => "calli",
    Ret = 0x2A => "ret",
    Br_S = 0x2B => "br.s",
    Brfalse_S = 0x2C => "brfalse.s",
    Brtrue_S = 0x2D => "brtrue.s",
    Beq_S = 0x2E => "beq.s",
    Bge_S = 0x2F => "bge.s",
    Bgt_S = 0x30 => "bgt.s",
    Ble_S = 0x31 => "ble.s",
    Blt_S = 0x32 => "blt.s",
    Bne_Un_S = 0x33 => "bne.un.s",
    Bge_Un_S = 0x34 => "bge.un.s",
    Bgt_Un_S = 0x35 => "bgt.un.s",
    Ble_Un_S = 0x36 => "ble.un.s",
    Blt_Un_S = 0x37 => "blt.un.s",
    Br = 0x38 => "br",
    Brfalse = 0x39 => "brfalse",
    Brtrue = 0x3A => "brtrue",
    Beq = 0x3B => "beq",
    Bge = 0x3C => "bge",
    Bgt = 0x3D => "bgt",
    Ble = 0x3E => "ble",
    Blt = 0x3F => "blt",
    Bne_Un = 0x40 => "bne.un",
    Bge_Un = 0x41 => "bge.un",
    Bgt_Un = 0x42 => "bgt.un",
    Ble_Un = 0x43 => "ble.un",
    Blt_Un = 0x44 => "blt.un",
    Switch = 0x45 => "switch",
    Ldind_I1 = 0x46 => "ldind.i1",
    Ldind_U1 = 0x47 => "ldind.u1",
    Ldind_I2 = 0x48 => "ldind.i2",
    Ldind_U2 = 0x49 => "ldind.u2",
    Ldind_I4 = 0x4A => "ldind.i4",
    Ldind_U4 = 0x4B => "ldind.u4",
    Ldind_I8 = 0x4C => "ldind.i8",
    Ldind_I = 0x4D => "ldind.i",
    Ldind_R4 = 0x4E => "ldind.r4",
    Ldind_R8 = 0x4F => "ldind.r8",
    Ldind_Ref = 0x50 => "ldind.ref",
    Stind_Ref = 0x51 => "stind.ref",
    Stind_I1 = 0x52 => "stind.i1",
    Stind_I2 = 0x53 => "stind.i2",
    Stind_I4 = 0x54 => "stind.i4",
    Stind_I8 = 0x55 => "stind.i8",
    Stind_R4 = 0x56 => "stind.r4",
    Stind_R8 = 0x57 => "stind.r8",
    Add = 0x58 => "add",
    Sub = 0x59 => "sub",
    Mul = 0x5A => "mul",
    Div = 0x5B => "div",
    Div_Un = 0x5C => "div.un",
    Rem = 0x5D => "rem",
    Rem_Un = 0x5E => "rem.un",
    And = 0x5F => "and",
    Or = 0x60 => "or",
    Xor = 0x61 => "xor",
    Shl = 0x62 => "shl",
    Shr = 0x63 => "shr",
    Shr_Un = 0x64 => "shr.un",
    Neg = 0x65 => "neg",
    Not = 0x66 => "not",
    Conv_I1 = 0x67 => "conv.i1",
    Conv_I2 = 0x68 => "conv.i2",
    Conv_I4 = 0x69 => "conv.i4",
    Conv_I8 = 0x6A => "conv.i8",
    Conv_R4 = 0x6B => "conv.r4",
    Conv_R8 = 0x6C => "conv.r8",
    Conv_U4 = 0x6D => "conv.u4",
    Conv_U8 = 0x6E => "conv.u8",
    Callvirt = 0x6F => "callvirt",
    Cpobj = 0x70 => "cpobj",
    Ldobj = 0x71 => "ldobj",
    Ldstr = 0x72 => "ldstr",
    Newobj = 0x73 => "newobj",
    Castclass = 0x74 => "castclass",
    Isinst = 0x75 => "isinst",
    Conv_R_Un = 0x76 => "conv.r.un",
    Unbox = 0x79 => "unbox",
    Throw = 0x7A => "throw",
    Ldfld = 0x7B => "ldfld",
    Ldflda = 0x7C => "ldflda",
    Stfld = 0x7D => "stfld",
    Ldsfld = 0x7E => "ldsfld",
    Ldsflda = 0x7F => "ldsflda",
    Stsfld = 0x80 => "stsfld",
    Stobj = 0x81 => "stobj",
    Conv_Ovf_I1_Un = 0x82 => "conv.ovf.i1.un",
    Conv_Ovf_I2_Un = 0x83 => "conv.ovf.i2.un",
    Conv_Ovf_I4_Un = 0x84 => "conv.ovf.i4.un",
    Conv_Ovf_I8_Un = 0x85 => "conv.ovf.i8.un",
    Conv_Ovf_U1_Un = 0x86 => "conv.ovf.u1.un",
    Conv_Ovf_U2_Un = 0x87 => "conv.ovf.u2.un",
    Conv_Ovf_U4_Un = 0x88 => "conv.ovf.u4.un",
    Conv_Ovf_U8_Un = 0x89 => "conv.ovf.u8.un",
    Conv_Ovf_I_Un = 0x8A => "conv.ovf.i.un",
    Conv_Ovf_U_Un = 0x8B => "conv.ovf.u.un",
    Box = 0x8C => "box",
    Newarr = 0x8D => "newarr",
    Ldlen = 0x8E => "ldlen",
    Ldelema = 0x8F => "ldelema",
    Ldelem_I1 = 0x90 => "ldelem.i1",
    Ldelem_U1 = 0x91 => "ldelem.u1",
    Ldelem_I2 = 0x92 => "ldelem.i2",
    Ldelem_U2 = 0x93 => "ldelem.u2",
    Ldelem_I4 = 0x94 => "ldelem.i4",
    Ldelem_U4 = 0x95 => "ldelem.u4",
    Ldelem_I8 = 0x96 => "ldelem.i8",
    Ldelem_I = 0x97 => "ldelem.i",
    Ldelem_R4 = 0x98 => "ldelem.r4",
    Ldelem_R8 = 0x99 => "ldelem.r8",
    Ldelem_Ref = 0x9A => "ldelem.ref",
    Stelem_I = 0x9B => "stelem.i",
    Stelem_I1 = 0x9C => "stelem.i1",
    Stelem_I2 = 0x9D => "stelem.i2",
    Stelem_I4 = 0x9E => "stelem.i4",
    Stelem_I8 = 0x9F => "stelem.i8",
    Stelem_R4 = 0xA0 => "stelem.r4",
    Stelem_R8 = 0xA1 => "stelem.r8",
    Stelem_Ref = 0xA2 => "stelem.ref",
    Ldelem = 0xA3 => "ldelem",
    Stelem = 0xA4 => "stelem",
    Unbox_Any = 0xA5 => "unbox.any",
    Conv_Ovf_I1 = 0xB3 => "conv.ovf.i1",
    Conv_Ovf_U1 = 0xB4 => "conv.ovf.u1",
    Conv_Ovf_I2 = 0xB5 => "conv.ovf.i2",
    Conv_Ovf_U2 = 0xB6 => "conv.ovf.u2",
    Conv_Ovf_I4 = 0xB7 => "conv.ovf.i4",
    Conv_Ovf_U4 = 0xB8 => "conv.ovf.u4",
    Conv_Ovf_I8 = 0xB9 => "conv.ovf.i8",
    Conv_Ovf_U8 = 0xBA => "conv.ovf.u8",
    Refanyval = 0xC2 => "refanyval",
    Ckfinite = 0xC3 => "ckfinite",
    Mkrefany = 0xC6 => "mkrefany",
    Ldtoken = 0xD0 => "ldtoken",
    Conv_U2 = 0xD1 => "conv.u2",
    Conv_U1 = 0xD2 => "conv.u1",
    Conv_I = 0xD3 => "conv.i",
    Conv_Ovf_I = 0xD4 => "conv.ovf.i",
    Conv_Ovf_U = 0xD5 => "conv.ovf.u",
    Add_Ovf = 0xD6 => "add.ovf",
    Add_Ovf_Un = 0xD7 => "add.ovf.un",
    Mul_Ovf = 0xD8 => "mul.ovf",
    Mul_Ovf_Un = 0xD9 => "mul.ovf.un",
    Sub_Ovf = 0xDA => "sub.ovf",
    Sub_Ovf_Un = 0xDB => "sub.ovf.un",
    Endfinally = 0xDC => "endfinally",
    Leave = 0xDD => "leave",
    Leave_S = 0xDE => "leave.s",
    Stind_I = 0xDF => "stind.i",
    Conv_U = 0xE0 => "conv.u",
    Arglist = 0xFE00 => "arglist",
    Ceq = 0xFE01 => "ceq",
    Cgt = 0xFE02 => "cgt",
    Cgt_Un = 0xFE03 => "cgt.un",
    Clt = 0xFE04 => "clt",
    Clt_Un = 0xFE05 => "clt.un",
    Ldftn = 0xFE06 => "ldftn",
    Ldvirtftn = 0xFE07 => "ldvirtftn",
    Ldarg = 0xFE09 => "ldarg",
    Ldarga = 0xFE0A => "ldarga",
    Starg = 0xFE0B => "starg",
    Ldloc = 0xFE0C => "ldloc",
    Ldloca = 0xFE0D => "ldloca",
    Stloc = 0xFE0E => "stloc",
    Localloc = 0xFE0F => "localloc",
    Endfilter = 0xFE11 => "endfilter",
    Unaligned = 0xFE12 => "unaligned.",
    Volatile = 0xFE13 => "volatile.",
    Tail = 0xFE14 => "tail.",
    Initobj = 0xFE15 => "initobj",
    Constrained = 0xFE16 => "constrained.",
    Cpblk = 0xFE17 => "cpblk",
    Initblk = 0xFE18 => "initblk",
    No = 0xFE19 => "no.",
    Rethrow = 0xFE1A => "rethrow",
    Sizeof = 0xFE1C => "sizeof",
    Refanytype = 0xFE1D => "refanytype",
    Readonly = 0xFE1E => "readonly.",
}

/// The operand a macro opcode encodes in its own spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpliedOperand {
    /// Raw argument slot, slot 0 being `this` for instance methods.
    Argument(u16),
    /// Local variable slot.
    Local(u16),
    /// 32-bit integer constant.
    Int32(i32),
}

impl OpCode {
    /// Returns `true` for opcodes using the `0xFE` prefix.
    #[must_use]
    pub fn is_two_byte(self) -> bool {
        self.code() > 0xFF
    }

    /// Rewrites a macro opcode into its general form.
    ///
    /// Returns the general opcode and, for forms such as `ldarg.2` or
    /// `ldc.i4.m1`, the operand the short spelling implied. Short branch and
    /// short-operand forms map to the long form with no implied operand.
    /// Non-macro opcodes are returned unchanged.
    #[must_use]
    pub fn expand(self) -> (OpCode, Option<ImpliedOperand>) {
        use ImpliedOperand::{Argument, Int32, Local};
        match self {
            Self::Ldarg_0 => (Self::Ldarg, Some(Argument(0))),
            Self::Ldarg_1 => (Self::Ldarg, Some(Argument(1))),
            Self::Ldarg_2 => (Self::Ldarg, Some(Argument(2))),
            Self::Ldarg_3 => (Self::Ldarg, Some(Argument(3))),
            Self::Ldloc_0 => (Self::Ldloc, Some(Local(0))),
            Self::Ldloc_1 => (Self::Ldloc, Some(Local(1))),
            Self::Ldloc_2 => (Self::Ldloc, Some(Local(2))),
            Self::Ldloc_3 => (Self::Ldloc, Some(Local(3))),
            Self::Stloc_0 => (Self::Stloc, Some(Local(0))),
            Self::Stloc_1 => (Self::Stloc, Some(Local(1))),
            Self::Stloc_2 => (Self::Stloc, Some(Local(2))),
            Self::Stloc_3 => (Self::Stloc, Some(Local(3))),
            Self::Ldarg_S => (Self::Ldarg, None),
            Self::Ldarga_S => (Self::Ldarga, None),
            Self::Starg_S => (Self::Starg, None),
            Self::Ldloc_S => (Self::Ldloc, None),
            Self::Ldloca_S => (Self::Ldloca, None),
            Self::Stloc_S => (Self::Stloc, None),
            Self::Ldc_I4_M1 => (Self::Ldc_I4, Some(Int32(-1))),
            Self::Ldc_I4_0 => (Self::Ldc_I4, Some(Int32(0))),
            Self::Ldc_I4_1 => (Self::Ldc_I4, Some(Int32(1))),
            Self::Ldc_I4_2 => (Self::Ldc_I4, Some(Int32(2))),
            Self::Ldc_I4_3 => (Self::Ldc_I4, Some(Int32(3))),
            Self::Ldc_I4_4 => (Self::Ldc_I4, Some(Int32(4))),
            Self::Ldc_I4_5 => (Self::Ldc_I4, Some(Int32(5))),
            Self::Ldc_I4_6 => (Self::Ldc_I4, Some(Int32(6))),
            Self::Ldc_I4_7 => (Self::Ldc_I4, Some(Int32(7))),
            Self::Ldc_I4_8 => (Self::Ldc_I4, Some(Int32(8))),
            Self::Ldc_I4_S => (Self::Ldc_I4, None),
            Self::Br_S => (Self::Br, None),
            Self::Brfalse_S => (Self::Brfalse, None),
            Self::Brtrue_S => (Self::Brtrue, None),
            Self::Beq_S => (Self::Beq, None),
            Self::Bge_S => (Self::Bge, None),
            Self::Bgt_S => (Self::Bgt, None),
            Self::Ble_S => (Self::Ble, None),
            Self::Blt_S => (Self::Blt, None),
            Self::Bne_Un_S => (Self::Bne_Un, None),
            Self::Bge_Un_S => (Self::Bge_Un, None),
            Self::Bgt_Un_S => (Self::Bgt_Un, None),
            Self::Ble_Un_S => (Self::Ble_Un, None),
            Self::Blt_Un_S => (Self::Blt_Un, None),
            Self::Leave_S => (Self::Leave, None),
            other => (other, None),
        }
    }

    /// Returns `true` if [`OpCode::expand`] would change this opcode.
    #[must_use]
    pub fn is_macro(self) -> bool {
        self.expand().0 != self
    }

    /// Returns `true` for the `ldelem.<prim>` family with a statically known primitive width.
    #[must_use]
    pub fn is_primitive_ldelem(self) -> bool {
        matches!(
            self,
            Self::Ldelem_I1
                | Self::Ldelem_U1
                | Self::Ldelem_I2
                | Self::Ldelem_U2
                | Self::Ldelem_I4
                | Self::Ldelem_U4
                | Self::Ldelem_I8
                | Self::Ldelem_I
                | Self::Ldelem_R4
                | Self::Ldelem_R8
        )
    }

    /// Returns `true` for the `stelem.<prim>` family with a statically known primitive width.
    #[must_use]
    pub fn is_primitive_stelem(self) -> bool {
        matches!(
            self,
            Self::Stelem_I1
                | Self::Stelem_I2
                | Self::Stelem_I4
                | Self::Stelem_I8
                | Self::Stelem_I
                | Self::Stelem_R4
                | Self::Stelem_R8
        )
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use strum::IntoEnumIterator;

    #[test]
    fn codes_are_unique_and_decodable() {
        let mut seen = HashSet::new();
        for opcode in OpCode::iter() {
            assert!(seen.insert(opcode.code()), "duplicate code for {opcode}");
            assert_eq!(OpCode::from_code(opcode.code()), Some(opcode));
        }
        assert_eq!(seen.len(), OpCode::COUNT);
    }

    #[test]
    fn two_byte_opcodes() {
        assert!(OpCode::Arglist.is_two_byte());
        assert!(OpCode::Ldarg.is_two_byte());
        assert!(!OpCode::Ldarg_S.is_two_byte());
        assert_eq!(OpCode::Sizeof.code(), 0xFE1C);
        assert_eq!(OpCode::from_code(0x24), None);
    }

    #[test]
    fn expand_macro_forms() {
        assert_eq!(
            OpCode::Ldarg_1.expand(),
            (OpCode::Ldarg, Some(ImpliedOperand::Argument(1)))
        );
        assert_eq!(
            OpCode::Stloc_3.expand(),
            (OpCode::Stloc, Some(ImpliedOperand::Local(3)))
        );
        assert_eq!(
            OpCode::Ldc_I4_M1.expand(),
            (OpCode::Ldc_I4, Some(ImpliedOperand::Int32(-1)))
        );
        assert_eq!(OpCode::Br_S.expand(), (OpCode::Br, None));
        assert_eq!(OpCode::Ldc_I4_S.expand(), (OpCode::Ldc_I4, None));
        assert_eq!(OpCode::Call.expand(), (OpCode::Call, None));
    }

    #[test]
    fn expanded_forms_are_not_macros() {
        for opcode in OpCode::iter() {
            let (general, _) = opcode.expand();
            assert!(!general.is_macro(), "{general} still expands");
        }
    }

    #[test]
    fn mnemonics() {
        assert_eq!(OpCode::Ldelem_Ref.mnemonic(), "ldelem.ref");
        assert_eq!(OpCode::Constrained.to_string(), "constrained.");
    }
}
