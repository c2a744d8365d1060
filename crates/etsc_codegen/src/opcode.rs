//! Accumulator-register bytecode opcodes.
//!
//! Every instruction reads or writes the accumulator (`acc`) and names at
//! most a handful of virtual registers (`vA`, `vB`). Values come in three
//! widths and most data-moving instructions exist once per width:
//! - narrow: 32-bit integers, booleans, chars and enum ordinals
//! - wide: `long` and `double`
//! - object: GC references, including `null` and `undefined`

/// Opcode enumeration.
///
/// Binary operators compute `acc = vA <op> acc`; conditional jumps compare
/// `acc` against `vA` (or zero) and jump when `acc <op> vA` holds.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ===== Accumulator loads (0x00-0x0F) =====
    /// No operation
    Nop = 0x00,
    /// acc = 32-bit immediate
    Ldai = 0x01,
    /// acc = 64-bit immediate
    LdaiWide = 0x02,
    /// acc = f32 immediate
    Fldai = 0x03,
    /// acc = f64 immediate
    FldaiWide = 0x04,
    /// acc = string constant
    LdaStr = 0x05,
    /// acc = null
    LdaNull = 0x06,
    /// acc = undefined
    LdaUndefined = 0x07,
    /// acc = runtime type object of a record
    LdaType = 0x08,
    /// acc = new array filled from a literal buffer
    LdaConst = 0x09,

    // ===== Register transfer (0x10-0x1F) =====
    /// acc = vA
    Lda = 0x10,
    LdaWide = 0x11,
    LdaObj = 0x12,
    /// vA = acc
    Sta = 0x13,
    StaWide = 0x14,
    StaObj = 0x15,
    /// vA = vB
    Mov = 0x16,
    MovWide = 0x17,
    MovObj = 0x18,

    // ===== Integer arithmetic (0x20-0x3F) =====
    Add2 = 0x20,
    Sub2 = 0x21,
    Mul2 = 0x22,
    /// Throws `ArithmeticException` on a zero divisor
    Div2 = 0x23,
    Mod2 = 0x24,
    Shl2 = 0x25,
    /// Logical (unsigned) right shift
    Shr2 = 0x26,
    /// Arithmetic (signed) right shift
    Ashr2 = 0x27,
    And2 = 0x28,
    Or2 = 0x29,
    Xor2 = 0x2A,
    Add2Wide = 0x30,
    Sub2Wide = 0x31,
    Mul2Wide = 0x32,
    Div2Wide = 0x33,
    Mod2Wide = 0x34,
    Shl2Wide = 0x35,
    Shr2Wide = 0x36,
    Ashr2Wide = 0x37,
    And2Wide = 0x38,
    Or2Wide = 0x39,
    Xor2Wide = 0x3A,
    /// acc = acc ^ immediate
    Xori = 0x3B,
    /// acc = -acc
    Neg = 0x3C,
    NegWide = 0x3D,
    /// acc = ~acc
    Not = 0x3E,
    NotWide = 0x3F,

    // ===== Float arithmetic (0x40-0x4F) =====
    Fadd2 = 0x40,
    Fsub2 = 0x41,
    Fmul2 = 0x42,
    Fdiv2 = 0x43,
    Fmod2 = 0x44,
    Fadd2Wide = 0x45,
    Fsub2Wide = 0x46,
    Fmul2Wide = 0x47,
    Fdiv2Wide = 0x48,
    Fmod2Wide = 0x49,
    Fneg = 0x4A,
    FnegWide = 0x4B,

    // ===== Comparisons (0x50-0x5F) =====
    /// acc = sign(vA - acc) for 32-bit integers
    Cmp = 0x50,
    /// acc = sign(vA - acc) for 64-bit integers
    CmpWide = 0x51,
    /// acc = sign(vA - acc) for f32, -1 when either is NaN
    Fcmpl = 0x52,
    /// acc = sign(vA - acc) for f64, -1 when either is NaN
    FcmplWide = 0x53,

    // ===== Jumps (0x60-0x7F) =====
    Jeqz = 0x60,
    Jnez = 0x61,
    Jltz = 0x62,
    Jlez = 0x63,
    Jgtz = 0x64,
    Jgez = 0x65,
    Jeq = 0x66,
    Jne = 0x67,
    Jlt = 0x68,
    Jle = 0x69,
    Jgt = 0x6A,
    Jge = 0x6B,
    /// Jump when acc is `null` or `undefined`
    JeqzObj = 0x6C,
    /// Jump when acc is neither `null` nor `undefined`
    JnezObj = 0x6D,
    /// Jump when acc and vA are the same reference
    JeqObj = 0x6E,
    JneObj = 0x6F,
    Jmp = 0x70,

    // ===== Conversions (0x80-0x8F) =====
    I32toi64 = 0x80,
    I64toi32 = 0x81,
    I32tof32 = 0x82,
    I32tof64 = 0x83,
    I64tof32 = 0x84,
    I64tof64 = 0x85,
    F32toi32 = 0x86,
    F32toi64 = 0x87,
    F32tof64 = 0x88,
    F64toi32 = 0x89,
    F64toi64 = 0x8A,
    F64tof32 = 0x8B,
    I32toi8 = 0x8C,
    I32toi16 = 0x8D,
    I32tou16 = 0x8E,

    // ===== Objects (0x90-0xAF) =====
    /// acc = new uninitialized object of a record
    Newobj = 0x90,
    /// acc = new object, constructed by a constructor with the given
    /// argument registers
    Initobj = 0x91,
    /// acc = vA.field
    Ldobj = 0x92,
    LdobjWide = 0x93,
    LdobjObj = 0x94,
    /// vA.field = acc
    Stobj = 0x95,
    StobjWide = 0x96,
    StobjObj = 0x97,
    /// acc = vA.name, resolved by name at run time
    LdobjName = 0x98,
    LdobjNameWide = 0x99,
    LdobjNameObj = 0x9A,
    /// vA.name = acc, resolved by name at run time
    StobjName = 0x9B,
    StobjNameWide = 0x9C,
    StobjNameObj = 0x9D,
    /// acc = static field
    Ldstatic = 0xA0,
    LdstaticWide = 0xA1,
    LdstaticObj = 0xA2,
    /// static field = acc
    Ststatic = 0xA3,
    StstaticWide = 0xA4,
    StstaticObj = 0xA5,

    // ===== Arrays (0xB0-0xBF) =====
    /// acc = new array of element type with vA elements
    Newarr = 0xB0,
    /// acc = length of array vA
    Lenarr = 0xB1,
    /// acc = vA[acc]
    Ldarr = 0xB2,
    LdarrWide = 0xB3,
    LdarrObj = 0xB4,
    /// vA[vB] = acc
    Starr = 0xB5,
    StarrWide = 0xB6,
    StarrObj = 0xB7,

    // ===== Calls (0xC0-0xCF) =====
    /// Static call with up to four register arguments
    CallShort = 0xC0,
    /// Static call with a register range
    CallRange = 0xC1,
    /// Virtual call; the first register is the receiver
    CallVirt = 0xC2,
    /// Static call whose first argument is acc
    CallAccShort = 0xC3,
    /// Virtual call whose receiver is acc
    CallVirtAccShort = 0xC4,
    /// Start a coroutine; acc = its promise
    Launch = 0xC5,

    // ===== Types and control (0xD0-0xDF) =====
    /// acc = 1 if acc is an instance of the type, else 0
    Isinstance = 0xD0,
    /// Throw `ClassCastException` unless acc is an instance of the type
    Checkcast = 0xD1,
    /// Throw the exception object in vA
    Throw = 0xD2,
    Return = 0xD3,
    ReturnWide = 0xD4,
    ReturnObj = 0xD5,
    ReturnVoid = 0xD6,
}

impl Opcode {
    /// Assembly mnemonic.
    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            Nop => "nop",
            Ldai => "ldai",
            LdaiWide => "ldai.64",
            Fldai => "fldai",
            FldaiWide => "fldai.64",
            LdaStr => "lda.str",
            LdaNull => "lda.null",
            LdaUndefined => "lda.undefined",
            LdaType => "lda.type",
            LdaConst => "lda.const",
            Lda => "lda",
            LdaWide => "lda.64",
            LdaObj => "lda.obj",
            Sta => "sta",
            StaWide => "sta.64",
            StaObj => "sta.obj",
            Mov => "mov",
            MovWide => "mov.64",
            MovObj => "mov.obj",
            Add2 => "add2",
            Sub2 => "sub2",
            Mul2 => "mul2",
            Div2 => "div2",
            Mod2 => "mod2",
            Shl2 => "shl2",
            Shr2 => "shr2",
            Ashr2 => "ashr2",
            And2 => "and2",
            Or2 => "or2",
            Xor2 => "xor2",
            Add2Wide => "add2.64",
            Sub2Wide => "sub2.64",
            Mul2Wide => "mul2.64",
            Div2Wide => "div2.64",
            Mod2Wide => "mod2.64",
            Shl2Wide => "shl2.64",
            Shr2Wide => "shr2.64",
            Ashr2Wide => "ashr2.64",
            And2Wide => "and2.64",
            Or2Wide => "or2.64",
            Xor2Wide => "xor2.64",
            Xori => "xori",
            Neg => "neg",
            NegWide => "neg.64",
            Not => "not",
            NotWide => "not.64",
            Fadd2 => "fadd2",
            Fsub2 => "fsub2",
            Fmul2 => "fmul2",
            Fdiv2 => "fdiv2",
            Fmod2 => "fmod2",
            Fadd2Wide => "fadd2.64",
            Fsub2Wide => "fsub2.64",
            Fmul2Wide => "fmul2.64",
            Fdiv2Wide => "fdiv2.64",
            Fmod2Wide => "fmod2.64",
            Fneg => "fneg",
            FnegWide => "fneg.64",
            Cmp => "cmp",
            CmpWide => "cmp.64",
            Fcmpl => "fcmpl",
            FcmplWide => "fcmpl.64",
            Jeqz => "jeqz",
            Jnez => "jnez",
            Jltz => "jltz",
            Jlez => "jlez",
            Jgtz => "jgtz",
            Jgez => "jgez",
            Jeq => "jeq",
            Jne => "jne",
            Jlt => "jlt",
            Jle => "jle",
            Jgt => "jgt",
            Jge => "jge",
            JeqzObj => "jeqz.obj",
            JnezObj => "jnez.obj",
            JeqObj => "jeq.obj",
            JneObj => "jne.obj",
            Jmp => "jmp",
            I32toi64 => "i32toi64",
            I64toi32 => "i64toi32",
            I32tof32 => "i32tof32",
            I32tof64 => "i32tof64",
            I64tof32 => "i64tof32",
            I64tof64 => "i64tof64",
            F32toi32 => "f32toi32",
            F32toi64 => "f32toi64",
            F32tof64 => "f32tof64",
            F64toi32 => "f64toi32",
            F64toi64 => "f64toi64",
            F64tof32 => "f64tof32",
            I32toi8 => "i32toi8",
            I32toi16 => "i32toi16",
            I32tou16 => "i32tou16",
            Newobj => "newobj",
            Initobj => "initobj",
            Ldobj => "ldobj",
            LdobjWide => "ldobj.64",
            LdobjObj => "ldobj.obj",
            Stobj => "stobj",
            StobjWide => "stobj.64",
            StobjObj => "stobj.obj",
            LdobjName => "ldobj.name",
            LdobjNameWide => "ldobj.name.64",
            LdobjNameObj => "ldobj.name.obj",
            StobjName => "stobj.name",
            StobjNameWide => "stobj.name.64",
            StobjNameObj => "stobj.name.obj",
            Ldstatic => "ldstatic",
            LdstaticWide => "ldstatic.64",
            LdstaticObj => "ldstatic.obj",
            Ststatic => "ststatic",
            StstaticWide => "ststatic.64",
            StstaticObj => "ststatic.obj",
            Newarr => "newarr",
            Lenarr => "lenarr",
            Ldarr => "ldarr",
            LdarrWide => "ldarr.64",
            LdarrObj => "ldarr.obj",
            Starr => "starr",
            StarrWide => "starr.64",
            StarrObj => "starr.obj",
            CallShort => "call.short",
            CallRange => "call.range",
            CallVirt => "call.virt",
            CallAccShort => "call.acc.short",
            CallVirtAccShort => "call.virt.acc.short",
            Launch => "launch",
            Isinstance => "isinstance",
            Checkcast => "checkcast",
            Throw => "throw",
            Return => "return",
            ReturnWide => "return.64",
            ReturnObj => "return.obj",
            ReturnVoid => "return.void",
        }
    }

    /// Whether this opcode transfers control to a label.
    pub fn is_jump(self) -> bool {
        (self as u8) >= Opcode::Jeqz as u8 && (self as u8) <= Opcode::Jmp as u8
    }

    pub fn is_call(self) -> bool {
        matches!(
            self,
            Opcode::CallShort
                | Opcode::CallRange
                | Opcode::CallVirt
                | Opcode::CallAccShort
                | Opcode::CallVirtAccShort
                | Opcode::Launch
                | Opcode::Initobj
        )
    }

    pub fn is_return(self) -> bool {
        matches!(self, Opcode::Return | Opcode::ReturnWide | Opcode::ReturnObj | Opcode::ReturnVoid)
    }

    /// Whether control never falls through to the next instruction.
    pub fn is_terminator(self) -> bool {
        self.is_return() || matches!(self, Opcode::Jmp | Opcode::Throw)
    }

    /// Whether this opcode stores the accumulator into the register named
    /// by its first operand.
    pub fn is_register_store(self) -> bool {
        matches!(self, Opcode::Sta | Opcode::StaWide | Opcode::StaObj)
    }

    /// The register load matching a register store of the same width.
    pub fn matching_load(self) -> Option<Opcode> {
        match self {
            Opcode::Sta => Some(Opcode::Lda),
            Opcode::StaWide => Some(Opcode::LdaWide),
            Opcode::StaObj => Some(Opcode::LdaObj),
            _ => None,
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jump_range() {
        assert!(Opcode::Jeqz.is_jump());
        assert!(Opcode::JneObj.is_jump());
        assert!(Opcode::Jmp.is_jump());
        assert!(!Opcode::I32toi64.is_jump());
        assert!(!Opcode::FcmplWide.is_jump());
    }

    #[test]
    fn test_terminators() {
        assert!(Opcode::ReturnObj.is_terminator());
        assert!(Opcode::Throw.is_terminator());
        assert!(Opcode::Jmp.is_terminator());
        assert!(!Opcode::Jeqz.is_terminator());
        assert!(!Opcode::CallVirt.is_terminator());
    }

    #[test]
    fn test_store_load_pairs() {
        assert_eq!(Opcode::StaWide.matching_load(), Some(Opcode::LdaWide));
        assert_eq!(Opcode::Lda.matching_load(), None);
        assert_eq!(Opcode::LdaObj.mnemonic(), "lda.obj");
    }
}
