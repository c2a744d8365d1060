//! Per-function instruction buffer with register and accumulator typing.
//!
//! The emitter is the state machine of code generation: next to the
//! instruction list it keeps the static type currently held by every live
//! register and by the accumulator. Every typed operation reads those
//! types first, so reading a register that was never written is caught
//! here as [`CodegenError::UntypedRegister`] instead of producing a
//! mistyped instruction.

use crate::error::{CodegenError, CodegenResult};
use crate::instruction::{CatchBlock, CatchEntry, Instruction, Item, LabelId, Operand};
use crate::opcode::Opcode;
use crate::peephole;
use etsc_ast::TypeId;
use etsc_checker::{TypeFlags, TypeTable};
use etsc_core::collections::FxHashMap;
use etsc_core::IndexVec;

/// Register class of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    /// 32-bit integers, booleans, chars, floats and enum ordinals.
    Narrow,
    /// `long` and `double`.
    Wide,
    Object,
}

impl Width {
    pub fn of(table: &TypeTable, ty: TypeId) -> Width {
        let flags = table.flags(ty);
        if flags.intersects(TypeFlags::REFERENCE) {
            Width::Object
        } else if flags.intersects(TypeFlags::WIDE_NUMERIC) {
            Width::Wide
        } else {
            Width::Narrow
        }
    }

    /// Pick the opcode variant for this width.
    pub fn select(self, narrow: Opcode, wide: Opcode, object: Opcode) -> Opcode {
        match self {
            Width::Narrow => narrow,
            Width::Wide => wide,
            Width::Object => object,
        }
    }
}

/// A virtual register.
pub type Reg = u16;

/// The finished body of one function.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedBody {
    pub instructions: Vec<Instruction>,
    pub catch_table: Vec<CatchEntry>,
    pub register_count: u16,
}

pub struct Emitter<'a> {
    table: &'a TypeTable,
    function: String,
    items: Vec<Item>,
    /// Whether each label has been bound.
    labels: IndexVec<LabelId, bool>,
    catch_blocks: Vec<CatchBlock>,
    next_reg: Reg,
    max_reg: Reg,
    reg_types: FxHashMap<Reg, TypeId>,
    acc: Option<TypeId>,
}

impl<'a> Emitter<'a> {
    /// An emitter whose first `reserved` registers hold `this` and the
    /// parameters.
    pub fn new(table: &'a TypeTable, function: impl Into<String>, reserved: Reg) -> Self {
        Self {
            table,
            function: function.into(),
            items: Vec::new(),
            labels: IndexVec::new(),
            catch_blocks: Vec::new(),
            next_reg: reserved,
            max_reg: reserved,
            reg_types: FxHashMap::default(),
            acc: None,
        }
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn width(&self, ty: TypeId) -> Width {
        Width::of(self.table, ty)
    }

    // ========================================================================
    // Registers
    // ========================================================================

    pub fn alloc_reg(&mut self) -> Reg {
        let reg = self.next_reg;
        self.next_reg += 1;
        self.max_reg = self.max_reg.max(self.next_reg);
        reg
    }

    /// `count` consecutive registers; returns the first.
    pub fn alloc_range(&mut self, count: usize) -> Reg {
        let first = self.next_reg;
        for _ in 0..count {
            self.alloc_reg();
        }
        first
    }

    /// Current top of the register stack.
    pub fn mark(&self) -> Reg {
        self.next_reg
    }

    /// Free every register allocated since `mark`.
    pub fn release(&mut self, mark: Reg) {
        for reg in mark..self.next_reg {
            self.reg_types.remove(&reg);
        }
        self.next_reg = mark;
    }

    pub fn set_reg_type(&mut self, reg: Reg, ty: TypeId) {
        self.reg_types.insert(reg, ty);
    }

    pub fn reg_type(&self, reg: Reg) -> CodegenResult<TypeId> {
        self.reg_types.get(&reg).copied().ok_or_else(|| CodegenError::UntypedRegister {
            function: self.function.clone(),
            register: format!("v{}", reg),
        })
    }

    // ========================================================================
    // Accumulator
    // ========================================================================

    pub fn acc_type(&self) -> CodegenResult<TypeId> {
        self.acc.ok_or_else(|| CodegenError::UntypedRegister {
            function: self.function.clone(),
            register: "acc".to_string(),
        })
    }

    pub fn acc_type_opt(&self) -> Option<TypeId> {
        self.acc
    }

    pub fn set_acc(&mut self, ty: TypeId) {
        self.acc = Some(ty);
    }

    // ========================================================================
    // Emission
    // ========================================================================

    pub fn emit(&mut self, opcode: Opcode, operands: Vec<Operand>) {
        // Nothing after an unconditional transfer is reachable until the
        // next label.
        if self.is_terminated() {
            return;
        }
        self.items.push(Item::Insn(Instruction::new(opcode, operands)));
    }

    /// Whether the last emitted item ends control flow.
    pub fn is_terminated(&self) -> bool {
        matches!(self.items.last(), Some(Item::Insn(insn)) if insn.opcode.is_terminator())
    }

    /// `acc = vN`.
    pub fn load(&mut self, reg: Reg) -> CodegenResult<()> {
        let ty = self.reg_type(reg)?;
        let op = self.width(ty).select(Opcode::Lda, Opcode::LdaWide, Opcode::LdaObj);
        self.emit(op, vec![Operand::Reg(reg)]);
        self.acc = Some(ty);
        Ok(())
    }

    /// `vN = acc`.
    pub fn store(&mut self, reg: Reg) -> CodegenResult<()> {
        let ty = self.acc_type()?;
        let op = self.width(ty).select(Opcode::Sta, Opcode::StaWide, Opcode::StaObj);
        self.emit(op, vec![Operand::Reg(reg)]);
        self.reg_types.insert(reg, ty);
        Ok(())
    }

    /// Store the accumulator into a fresh register.
    pub fn store_temp(&mut self) -> CodegenResult<Reg> {
        let reg = self.alloc_reg();
        self.store(reg)?;
        Ok(reg)
    }

    /// `dst = src`.
    pub fn mov(&mut self, dst: Reg, src: Reg) -> CodegenResult<()> {
        let ty = self.reg_type(src)?;
        if dst == src {
            return Ok(());
        }
        let op = self.width(ty).select(Opcode::Mov, Opcode::MovWide, Opcode::MovObj);
        self.emit(op, vec![Operand::Reg(dst), Operand::Reg(src)]);
        self.reg_types.insert(dst, ty);
        Ok(())
    }

    /// An instruction reading register `reg` and leaving `result` in the
    /// accumulator.
    pub fn emit_with_reg(&mut self, opcode: Opcode, reg: Reg, result: Option<TypeId>) -> CodegenResult<()> {
        self.reg_type(reg)?;
        self.emit(opcode, vec![Operand::Reg(reg)]);
        self.acc = result;
        Ok(())
    }

    pub fn load_i32(&mut self, value: i32, ty: TypeId) {
        self.emit(Opcode::Ldai, vec![Operand::Imm(value as i64)]);
        self.acc = Some(ty);
    }

    pub fn load_i64(&mut self, value: i64, ty: TypeId) {
        self.emit(Opcode::LdaiWide, vec![Operand::Imm(value)]);
        self.acc = Some(ty);
    }

    pub fn load_f32(&mut self, value: f32, ty: TypeId) {
        self.emit(Opcode::Fldai, vec![Operand::FImm(value as f64)]);
        self.acc = Some(ty);
    }

    pub fn load_f64(&mut self, value: f64, ty: TypeId) {
        self.emit(Opcode::FldaiWide, vec![Operand::FImm(value)]);
        self.acc = Some(ty);
    }

    pub fn load_string(&mut self, value: &str) {
        self.emit(Opcode::LdaStr, vec![Operand::Str(value.to_string())]);
        self.acc = Some(self.table.global.string);
    }

    pub fn load_null(&mut self) {
        self.emit(Opcode::LdaNull, vec![]);
        self.acc = Some(self.table.global.null);
    }

    pub fn load_undefined(&mut self) {
        self.emit(Opcode::LdaUndefined, vec![]);
        self.acc = Some(self.table.global.undefined);
    }

    // ========================================================================
    // Labels and jumps
    // ========================================================================

    pub fn new_label(&mut self) -> LabelId {
        self.labels.push(false)
    }

    /// Bind `label` here. The accumulator type is unknown afterwards.
    pub fn set_label(&mut self, label: LabelId) {
        self.labels[label] = true;
        self.items.push(Item::Label(label));
        self.acc = None;
    }

    pub fn jump(&mut self, label: LabelId) {
        self.emit(Opcode::Jmp, vec![Operand::Label(label)]);
    }

    /// A conditional jump on the accumulator alone.
    pub fn branch(&mut self, opcode: Opcode, label: LabelId) -> CodegenResult<()> {
        self.acc_type()?;
        self.emit(opcode, vec![Operand::Label(label)]);
        Ok(())
    }

    /// A conditional jump comparing the accumulator with `reg`.
    pub fn branch_reg(&mut self, opcode: Opcode, reg: Reg, label: LabelId) -> CodegenResult<()> {
        self.acc_type()?;
        self.reg_type(reg)?;
        self.emit(opcode, vec![Operand::Reg(reg), Operand::Label(label)]);
        Ok(())
    }

    pub fn add_catch_block(&mut self, block: CatchBlock) {
        self.catch_blocks.push(block);
    }

    // ========================================================================
    // Finish
    // ========================================================================

    /// Resolve labels to instruction indices and build the catch table.
    pub fn finish(mut self, optimize: bool) -> CodegenResult<FinishedBody> {
        if optimize {
            peephole::run(&mut self.items);
        }

        let mut positions: FxHashMap<LabelId, usize> = FxHashMap::default();
        let mut index = 0;
        for item in &self.items {
            match item {
                Item::Label(label) => {
                    positions.insert(*label, index);
                }
                Item::Insn(_) => index += 1,
            }
        }
        let resolve = |label: LabelId| {
            positions.get(&label).copied().ok_or_else(|| CodegenError::UnboundLabel {
                function: self.function.clone(),
                label: label.0,
            })
        };

        let mut instructions = Vec::with_capacity(index);
        for item in &self.items {
            let Item::Insn(insn) = item else { continue };
            let mut insn = insn.clone();
            for operand in &mut insn.operands {
                if let Operand::Label(label) = *operand {
                    *operand = Operand::Target(resolve(label)?);
                }
            }
            instructions.push(insn);
        }

        let mut catch_table = Vec::with_capacity(self.catch_blocks.len());
        for block in &self.catch_blocks {
            let (begin, end) = (resolve(block.begin)?, resolve(block.end)?);
            if begin >= end {
                continue;
            }
            catch_table.push(CatchEntry { begin, end, handler: resolve(block.handler)?, exception: block.exception.clone() });
        }

        let used = instructions.iter().filter_map(|i| i.max_register()).map(|r| r + 1).max().unwrap_or(0);
        Ok(FinishedBody { instructions, catch_table, register_count: self.max_reg.max(used) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etsc_checker::PrimitiveKind;
    use etsc_core::StringInterner;

    fn table() -> TypeTable {
        TypeTable::new(StringInterner::new())
    }

    #[test]
    fn test_width_selection() {
        let t = table();
        assert_eq!(Width::of(&t, t.primitive(PrimitiveKind::Int)), Width::Narrow);
        assert_eq!(Width::of(&t, t.primitive(PrimitiveKind::Double)), Width::Wide);
        assert_eq!(Width::of(&t, t.global.string), Width::Object);
        assert_eq!(Width::of(&t, t.global.null), Width::Object);
    }

    #[test]
    fn test_untyped_register_read_is_an_error() {
        let t = table();
        let mut e = Emitter::new(&t, "f", 0);
        let r = e.alloc_reg();
        assert!(matches!(e.load(r), Err(CodegenError::UntypedRegister { .. })));
        assert!(matches!(e.store(r), Err(CodegenError::UntypedRegister { .. })));
        e.load_i64(7, t.primitive(PrimitiveKind::Long));
        e.store(r).unwrap();
        e.load(r).unwrap();
        let body = e.finish(false).unwrap();
        let ops: Vec<Opcode> = body.instructions.iter().map(|i| i.opcode).collect();
        assert_eq!(ops, [Opcode::LdaiWide, Opcode::StaWide, Opcode::LdaWide]);
        assert_eq!(body.register_count, 1);
    }

    #[test]
    fn test_release_forgets_types() {
        let t = table();
        let mut e = Emitter::new(&t, "f", 1);
        let mark = e.mark();
        e.load_string("x");
        let r = e.store_temp().unwrap();
        e.release(mark);
        assert!(e.reg_type(r).is_err());
        assert_eq!(e.alloc_reg(), r);
    }

    #[test]
    fn test_labels_resolve_and_unbound_fails() {
        let t = table();
        let int = t.primitive(PrimitiveKind::Int);
        let mut e = Emitter::new(&t, "f", 0);
        let end = e.new_label();
        e.load_i32(0, int);
        e.branch(Opcode::Jeqz, end).unwrap();
        e.load_i32(1, int);
        e.set_label(end);
        assert!(e.acc_type().is_err());
        e.emit(Opcode::ReturnVoid, vec![]);
        let body = e.finish(false).unwrap();
        assert_eq!(body.instructions[1].operands, vec![Operand::Target(3)]);

        let mut e = Emitter::new(&t, "g", 0);
        let missing = e.new_label();
        e.jump(missing);
        assert!(matches!(e.finish(false), Err(CodegenError::UnboundLabel { .. })));
    }

    #[test]
    fn test_code_after_terminator_is_dropped() {
        let t = table();
        let mut e = Emitter::new(&t, "f", 0);
        e.emit(Opcode::ReturnVoid, vec![]);
        e.emit(Opcode::Nop, vec![]);
        assert_eq!(e.items.len(), 1);
    }
}
