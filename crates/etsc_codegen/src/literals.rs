//! Literal buffers: constant arrays materialized by `lda.const`.
//!
//! Functions are compiled in parallel, so the pool is shared behind a
//! lock and deduplicates by content. Ids handed out during compilation
//! depend on scheduling; [`renumber`] rewrites them in order of first use
//! so the emitted program is deterministic.

use crate::instruction::Operand;
use crate::output::FunctionOutput;
use etsc_checker::ConstValue;
use etsc_core::collections::FxHashMap;
use parking_lot::Mutex;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    U1(bool),
    I8(i8),
    I16(i16),
    U16(u16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
}

impl LiteralValue {
    pub fn from_const(value: ConstValue) -> Self {
        match value {
            ConstValue::Boolean(v) => LiteralValue::U1(v),
            ConstValue::Byte(v) => LiteralValue::I8(v),
            ConstValue::Char(v) => LiteralValue::U16(v),
            ConstValue::Short(v) => LiteralValue::I16(v),
            ConstValue::Int(v) => LiteralValue::I32(v),
            ConstValue::Long(v) => LiteralValue::I64(v),
            ConstValue::Float(v) => LiteralValue::F32(v),
            ConstValue::Double(v) => LiteralValue::F64(v),
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::U1(v) => write!(f, "{}", *v as u8),
            LiteralValue::I8(v) => write!(f, "{}", v),
            LiteralValue::I16(v) => write!(f, "{}", v),
            LiteralValue::U16(v) => write!(f, "{}", v),
            LiteralValue::I32(v) => write!(f, "{}", v),
            LiteralValue::I64(v) => write!(f, "{}", v),
            LiteralValue::F32(v) => write!(f, "{:?}", v),
            LiteralValue::F64(v) => write!(f, "{:?}", v),
            LiteralValue::Str(v) => write!(f, "{:?}", v),
        }
    }
}

/// A typed constant array.
#[derive(Debug, Clone, PartialEq)]
pub struct LiteralBuffer {
    /// Descriptor of the element type.
    pub element: String,
    pub values: Vec<LiteralValue>,
}

impl fmt::Display for LiteralBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[] {{", self.element)?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", value)?;
        }
        f.write_str("}")
    }
}

#[derive(Default)]
struct PoolState {
    buffers: Vec<LiteralBuffer>,
    index: FxHashMap<String, u32>,
}

#[derive(Default)]
pub struct LiteralPool {
    state: Mutex<PoolState>,
}

impl LiteralPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `buffer`, adding it on first use.
    pub fn intern(&self, buffer: LiteralBuffer) -> u32 {
        let key = buffer.to_string();
        let mut state = self.state.lock();
        if let Some(&id) = state.index.get(&key) {
            return id;
        }
        let id = state.buffers.len() as u32;
        state.buffers.push(buffer);
        state.index.insert(key, id);
        id
    }

    pub fn len(&self) -> usize {
        self.state.lock().buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_buffers(self) -> Vec<LiteralBuffer> {
        self.state.into_inner().buffers
    }
}

/// Renumber literal ids by first use in `functions` and drop buffers no
/// function refers to.
pub fn renumber(functions: &mut [FunctionOutput], buffers: Vec<LiteralBuffer>) -> Vec<LiteralBuffer> {
    let mut mapping: FxHashMap<u32, u32> = FxHashMap::default();
    let mut ordered = Vec::with_capacity(buffers.len());
    for function in functions.iter_mut() {
        for insn in &mut function.instructions {
            for operand in &mut insn.operands {
                let Operand::Literal(old) = *operand else { continue };
                let next = mapping.len() as u32;
                let new = *mapping.entry(old).or_insert_with(|| {
                    ordered.push(old);
                    next
                });
                *operand = Operand::Literal(new);
            }
        }
    }
    let mut buffers: Vec<Option<LiteralBuffer>> = buffers.into_iter().map(Some).collect();
    ordered.into_iter().filter_map(|old| buffers.get_mut(old as usize).and_then(Option::take)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction;
    use crate::opcode::Opcode;

    fn ints(values: &[i32]) -> LiteralBuffer {
        LiteralBuffer { element: "i32".into(), values: values.iter().map(|v| LiteralValue::I32(*v)).collect() }
    }

    #[test]
    fn test_intern_deduplicates() {
        let pool = LiteralPool::new();
        assert_eq!(pool.intern(ints(&[1, 2])), 0);
        assert_eq!(pool.intern(ints(&[3])), 1);
        assert_eq!(pool.intern(ints(&[1, 2])), 0);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.into_buffers()[0].to_string(), "i32[] {1, 2}");
    }

    #[test]
    fn test_renumber_by_first_use() {
        let load = |id| Instruction::new(Opcode::LdaConst, vec![Operand::Literal(id)]);
        let mut functions = vec![FunctionOutput {
            name: "f".into(),
            param_count: 0,
            register_count: 0,
            is_static: true,
            instructions: vec![load(2), load(0), load(2)],
            catch_table: Vec::new(),
        }];
        let buffers = vec![ints(&[0]), ints(&[1]), ints(&[2])];
        let buffers = renumber(&mut functions, buffers);
        assert_eq!(buffers, vec![ints(&[2]), ints(&[0])]);
        let ids: Vec<_> = functions[0].instructions.iter().map(|i| i.operands[0].clone()).collect();
        assert_eq!(ids, vec![Operand::Literal(0), Operand::Literal(1), Operand::Literal(0)]);
    }
}
