//! Flag sets attached to AST nodes.

bitflags::bitflags! {
    /// Declaration modifiers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModifierFlags: u32 {
        const NONE      = 0;
        const EXPORT    = 1 << 0;
        const DECLARE   = 1 << 1;
        const PUBLIC    = 1 << 2;
        const PRIVATE   = 1 << 3;
        const PROTECTED = 1 << 4;
        const STATIC    = 1 << 5;
        const READONLY  = 1 << 6;
        const ABSTRACT  = 1 << 7;
        const ASYNC     = 1 << 8;
        const NATIVE    = 1 << 9;
        const CONST     = 1 << 10;
        const OVERRIDE  = 1 << 11;
        const FINAL     = 1 << 12;
        const DEFAULT   = 1 << 13;
        /// Created by the compiler rather than written by the user.
        const SYNTHETIC = 1 << 14;

        const ACCESS = Self::PUBLIC.bits() | Self::PRIVATE.bits() | Self::PROTECTED.bits();
    }
}

bitflags::bitflags! {
    /// Properties of a function body.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ScriptFunctionFlags: u32 {
        const NONE        = 0;
        const CONSTRUCTOR = 1 << 0;
        const METHOD      = 1 << 1;
        const GETTER      = 1 << 2;
        const SETTER      = 1 << 3;
        const ARROW       = 1 << 4;
        const ASYNC       = 1 << 5;
    }
}

bitflags::bitflags! {
    /// Conversions the code generator emits around a node's value.
    ///
    /// Set by the type relation engine. A node never carries both a boxing
    /// and an unboxing conversion.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BoxingUnboxingFlags: u32 {
        const NONE               = 0;
        const BOX_TO_BOOLEAN     = 1 << 0;
        const BOX_TO_BYTE        = 1 << 1;
        const BOX_TO_SHORT       = 1 << 2;
        const BOX_TO_CHAR        = 1 << 3;
        const BOX_TO_INT         = 1 << 4;
        const BOX_TO_LONG        = 1 << 5;
        const BOX_TO_FLOAT       = 1 << 6;
        const BOX_TO_DOUBLE      = 1 << 7;
        const UNBOX_TO_BOOLEAN   = 1 << 8;
        const UNBOX_TO_BYTE      = 1 << 9;
        const UNBOX_TO_SHORT     = 1 << 10;
        const UNBOX_TO_CHAR      = 1 << 11;
        const UNBOX_TO_INT       = 1 << 12;
        const UNBOX_TO_LONG      = 1 << 13;
        const UNBOX_TO_FLOAT     = 1 << 14;
        const UNBOX_TO_DOUBLE    = 1 << 15;

        const BOXING_FLAG = Self::BOX_TO_BOOLEAN.bits()
            | Self::BOX_TO_BYTE.bits()
            | Self::BOX_TO_SHORT.bits()
            | Self::BOX_TO_CHAR.bits()
            | Self::BOX_TO_INT.bits()
            | Self::BOX_TO_LONG.bits()
            | Self::BOX_TO_FLOAT.bits()
            | Self::BOX_TO_DOUBLE.bits();
        const UNBOXING_FLAG = Self::UNBOX_TO_BOOLEAN.bits()
            | Self::UNBOX_TO_BYTE.bits()
            | Self::UNBOX_TO_SHORT.bits()
            | Self::UNBOX_TO_CHAR.bits()
            | Self::UNBOX_TO_INT.bits()
            | Self::UNBOX_TO_LONG.bits()
            | Self::UNBOX_TO_FLOAT.bits()
            | Self::UNBOX_TO_DOUBLE.bits();
    }
}

impl BoxingUnboxingFlags {
    pub fn is_boxing(self) -> bool {
        self.intersects(Self::BOXING_FLAG)
    }

    pub fn is_unboxing(self) -> bool {
        self.intersects(Self::UNBOXING_FLAG)
    }
}
