//! Enum helper methods, expanded inline.
//!
//! An enum value is its ordinal. Names, values and string forms live in
//! literal buffers indexed by ordinal; the lookups `valueOf` and `fromInt`
//! scan those buffers.

use crate::error::{CodegenError, CodegenResult};
use crate::function::FunctionCompiler;
use crate::instruction::Operand;
use crate::literals::{LiteralBuffer, LiteralValue};
use crate::opcode::Opcode;
use etsc_ast::{NodeId, SignatureId, TypeId};
use etsc_checker::{EnumType, EnumValue};
use etsc_core::Name;

/// Per-ordinal table of an enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnumTable {
    Names,
    Values,
    /// `toString` results.
    Strings,
    Ordinals,
}

impl<'a> FunctionCompiler<'a> {
    fn enum_of(&self, ty: TypeId) -> CodegenResult<&'a EnumType> {
        self.table()
            .enum_type(ty)
            .ok_or_else(|| CodegenError::internal(format!("'{}' is not an enum", self.table().type_to_string(ty))))
    }

    fn enum_buffer(&self, e: &EnumType, which: EnumTable) -> LiteralBuffer {
        let values = e
            .members
            .iter()
            .enumerate()
            .map(|(ordinal, member)| match which {
                EnumTable::Names => LiteralValue::Str(self.table().interner().resolve(member.name).to_string()),
                EnumTable::Values => match &member.value {
                    EnumValue::Int(v) => LiteralValue::I32(*v),
                    EnumValue::Str(s) => LiteralValue::Str(s.clone()),
                },
                EnumTable::Strings => match &member.value {
                    EnumValue::Int(v) => LiteralValue::Str(v.to_string()),
                    EnumValue::Str(s) => LiteralValue::Str(s.clone()),
                },
                EnumTable::Ordinals => LiteralValue::I32(ordinal as i32),
            })
            .collect();
        let is_string = match which {
            EnumTable::Names | EnumTable::Strings => true,
            EnumTable::Values => e.is_string,
            EnumTable::Ordinals => false,
        };
        let element = if is_string { self.cx.string_record() } else { "i32".to_string() };
        LiteralBuffer { element, values }
    }

    /// `acc = table[acc]` for the ordinal in the accumulator.
    fn enum_lookup(&mut self, enum_ty: TypeId, which: EnumTable) -> CodegenResult<()> {
        let e = self.enum_of(enum_ty)?;
        let table = self.table();
        let element = match which {
            EnumTable::Values if !e.is_string => self.int_type(),
            EnumTable::Ordinals => self.int_type(),
            _ => table.global.string,
        };
        let mark = self.em.mark();
        self.em.set_acc(self.int_type());
        let ordinal = self.em.store_temp()?;
        let id = self.cx.literals.intern(self.enum_buffer(e, which));
        self.em.emit(Opcode::LdaConst, vec![Operand::Literal(id)]);
        self.em.set_acc(table.global.object);
        let array = self.em.store_temp()?;
        self.em.load(ordinal)?;
        self.load_element(array, element)?;
        self.em.release(mark);
        Ok(())
    }

    /// The string form of the enum value in the accumulator.
    pub(crate) fn enum_to_string(&mut self, enum_ty: TypeId) -> CodegenResult<()> {
        self.enum_lookup(enum_ty, EnumTable::Strings)
    }

    /// `getName`, `getValue` or `toString` on the value in the accumulator.
    pub(crate) fn compile_enum_instance_helper(&mut self, enum_ty: TypeId, name: Name) -> CodegenResult<()> {
        let which = match self.table().interner().resolve(name) {
            "getName" => EnumTable::Names,
            "getValue" => EnumTable::Values,
            "toString" => EnumTable::Strings,
            other => return Err(CodegenError::internal(format!("unknown enum method '{}'", other))),
        };
        self.enum_lookup(enum_ty, which)
    }

    /// `values`, `valueOf` or `fromInt` of an enum.
    pub(crate) fn compile_enum_static_helper(
        &mut self,
        enum_ty: TypeId,
        name: Name,
        sig: SignatureId,
        args: &[NodeId],
    ) -> CodegenResult<()> {
        let e = self.enum_of(enum_ty)?;
        let table = self.table();
        match table.interner().resolve(name) {
            "values" => {
                let id = self.cx.literals.intern(self.enum_buffer(e, EnumTable::Ordinals));
                self.em.emit(Opcode::LdaConst, vec![Operand::Literal(id)]);
                self.em.set_acc(table.signature(sig).return_type);
                Ok(())
            }
            "valueOf" => {
                let key = args.first().ok_or_else(|| CodegenError::internal("valueOf without an argument"))?;
                self.compile_expr_as(*key, table.global.string)?;
                self.enum_search(enum_ty, EnumTable::Names, true)
            }
            "fromInt" => {
                let key = args.first().ok_or_else(|| CodegenError::internal("fromInt without an argument"))?;
                self.compile_expr_as(*key, self.int_type())?;
                self.enum_search(enum_ty, EnumTable::Values, false)
            }
            other => Err(CodegenError::internal(format!("unknown enum method '{}'", other))),
        }
    }

    /// Find the ordinal whose entry in `which` equals the accumulator, or
    /// throw.
    fn enum_search(&mut self, enum_ty: TypeId, which: EnumTable, by_string: bool) -> CodegenResult<()> {
        let e = self.enum_of(enum_ty)?;
        let table = self.table();
        let int = self.int_type();
        let element = if by_string { table.global.string } else { int };
        let equals = if by_string {
            Some(self.builtin_method(table.global.string_class, "equals", false, |s| s.params.len() == 1)?)
        } else {
            None
        };

        let mark = self.em.mark();
        let key = self.em.store_temp()?;
        let id = self.cx.literals.intern(self.enum_buffer(e, which));
        self.em.emit(Opcode::LdaConst, vec![Operand::Literal(id)]);
        self.em.set_acc(table.global.object);
        let array = self.em.store_temp()?;
        self.em.emit_with_reg(Opcode::Lenarr, array, Some(int))?;
        let length = self.em.store_temp()?;
        self.em.load_i32(0, int);
        let index = self.em.store_temp()?;

        let (head, found, miss) = (self.em.new_label(), self.em.new_label(), self.em.new_label());
        self.em.set_label(head);
        self.em.load(index)?;
        self.em.branch_reg(Opcode::Jge, length, miss)?;
        self.em.load(index)?;
        self.load_element(array, element)?;
        match equals {
            Some(equals) => {
                let entry = self.em.store_temp()?;
                self.emit_call(Opcode::CallVirt, self.cx.method_id(equals), &[entry, key], Some(self.boolean_type()))?;
                self.em.branch(Opcode::Jnez, found)?;
            }
            None => self.em.branch_reg(Opcode::Jeq, key, found)?,
        }
        self.em.load_i32(1, int);
        self.em.emit_with_reg(Opcode::Add2, index, Some(int))?;
        self.em.store(index)?;
        self.em.jump(head);

        self.em.set_label(miss);
        let enum_name = table.interner().resolve(e.name);
        self.throw_new(table.global.exception, &format!("No enum constant in {}", enum_name))?;

        self.em.set_label(found);
        self.em.load(index)?;
        self.em.set_acc(enum_ty);
        self.em.release(mark);
        Ok(())
    }
}

