//! Local cleanups on a function body before label resolution.

use crate::instruction::Item;
use crate::opcode::Opcode;

/// Apply every rewrite until none fires. Returns the number of removed
/// instructions.
pub fn run(items: &mut Vec<Item>) -> usize {
    let mut removed = 0;
    loop {
        let before = items.len();
        remove_jumps_to_next(items);
        remove_reloads(items);
        if items.len() == before {
            break;
        }
        removed += before - items.len();
    }
    removed
}

/// `jmp L` directly followed by the binding of `L`.
fn remove_jumps_to_next(items: &mut Vec<Item>) {
    let mut i = 0;
    while i < items.len() {
        let target = match &items[i] {
            Item::Insn(insn) if insn.opcode == Opcode::Jmp => insn.label(),
            _ => None,
        };
        let falls_into = target.is_some_and(|target| {
            items[i + 1..]
                .iter()
                .take_while(|item| matches!(item, Item::Label(_)))
                .any(|item| *item == Item::Label(target))
        });
        if falls_into {
            items.remove(i);
        } else {
            i += 1;
        }
    }
}

/// `sta vN` directly followed by a load of `vN` of the same width: the
/// accumulator already holds the value.
fn remove_reloads(items: &mut Vec<Item>) {
    let mut i = 0;
    while i + 1 < items.len() {
        let redundant = match (&items[i], &items[i + 1]) {
            (Item::Insn(store), Item::Insn(load)) => {
                store.opcode.matching_load() == Some(load.opcode) && store.register() == load.register()
            }
            _ => false,
        };
        if redundant {
            items.remove(i + 1);
        } else {
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{Instruction, LabelId, Operand};

    fn insn(opcode: Opcode, operands: Vec<Operand>) -> Item {
        Item::Insn(Instruction::new(opcode, operands))
    }

    #[test]
    fn test_jump_to_next_label_is_removed() {
        let (a, b) = (LabelId(0), LabelId(1));
        let mut items = vec![
            insn(Opcode::Jmp, vec![Operand::Label(b)]),
            Item::Label(a),
            Item::Label(b),
            insn(Opcode::ReturnVoid, vec![]),
        ];
        assert_eq!(run(&mut items), 1);
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_jump_over_code_is_kept() {
        let b = LabelId(0);
        let mut items = vec![
            insn(Opcode::Jmp, vec![Operand::Label(b)]),
            insn(Opcode::Ldai, vec![Operand::Imm(1)]),
            Item::Label(b),
        ];
        assert_eq!(run(&mut items), 0);
    }

    #[test]
    fn test_store_then_load_same_register() {
        let mut items = vec![
            insn(Opcode::Sta, vec![Operand::Reg(1)]),
            insn(Opcode::Lda, vec![Operand::Reg(1)]),
            insn(Opcode::StaObj, vec![Operand::Reg(2)]),
            insn(Opcode::Lda, vec![Operand::Reg(2)]),
            insn(Opcode::Sta, vec![Operand::Reg(3)]),
            Item::Label(LabelId(0)),
            insn(Opcode::Lda, vec![Operand::Reg(3)]),
        ];
        assert_eq!(run(&mut items), 1);
        assert_eq!(items.len(), 6);
        assert_eq!(items[1], insn(Opcode::StaObj, vec![Operand::Reg(2)]));
    }
}
