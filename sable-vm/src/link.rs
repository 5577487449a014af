// sable-vm - Virtual machine for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Linking executables into a running engine.
//!
//! A batch is linked in two passes over a staged copy of the static table.
//! Registration declares every global and function of every unit, so a unit
//! may reference a name implemented by a later unit of the same batch.
//! Relocation then rewrites each unit-local static operand to its table
//! index. The engine only sees the result if every unit passes both.

use std::collections::HashSet;
use std::rc::Rc;

use sable_bytecode::{
    Executable, Instruction, OperandKind, TypeTag, instructions, max_stack_need,
};
use tracing::debug;

use crate::error::{Error, LinkError};
use crate::statics::{CodeBlock, FunctionId, StaticTable, UserFunction, VarId};
use crate::vm::{LinkedUnit, Vm};

/// Unit-local index to static-table index, per index space.
#[derive(Debug, Default)]
struct Resolution {
    vars: Vec<VarId>,
    functions: Vec<FunctionId>,
}

impl Vm {
    /// Link a batch of executables.
    ///
    /// May be called again later; indices already issued never move. Top-level
    /// code of the new units runs on the next [`Vm::run`] or
    /// [`Vm::run_top_level`].
    pub fn link(&mut self, units: Vec<Executable>) -> Result<(), Error> {
        let first_new_var = self.statics.var_count();
        let (staged, linked) = stage(&self.statics, units)?;
        self.statics = staged;

        for index in first_new_var..self.statics.var_count() {
            let Some(ty) = self.statics.var(VarId(index as u16)).map(|v| v.ty) else {
                continue;
            };
            let zero = self.zero_value(ty);
            self.statics
                .set_var_value(index, zero)
                .map_err(|e| self.fail(e))?;
        }

        debug!(
            units = linked.len(),
            globals = self.statics.var_count(),
            functions = self.statics.function_count(),
            "linked batch"
        );
        self.units.extend(linked);
        Ok(())
    }
}

fn stage(
    statics: &StaticTable,
    units: Vec<Executable>,
) -> Result<(StaticTable, Vec<LinkedUnit>), LinkError> {
    let mut staged = statics.clone();

    let mut implemented = HashSet::new();
    let mut resolutions = Vec::with_capacity(units.len());
    for exe in &units {
        resolutions.push(register(&mut staged, exe, &mut implemented)?);
    }

    let mut linked = Vec::with_capacity(units.len());
    for (exe, res) in units.into_iter().zip(&resolutions) {
        let Executable {
            package,
            constants,
            functions,
            code,
            lines,
            ..
        } = exe;
        let constants = Rc::new(constants);

        for (def, id) in functions.into_iter().zip(&res.functions) {
            if !def.implemented {
                continue;
            }
            let code = relocate(&package, &def.code, res)?;
            let locals: Rc<[TypeTag]> = def.locals.iter().map(|l| l.ty).collect();
            // Operands, declared locals and the CallInfo slot
            let frame_size = max_stack_need(&code)? + locals.len() + 1;
            let block = CodeBlock {
                code: Rc::from(code),
                constants: Rc::clone(&constants),
                lines: Rc::new(def.lines),
                frame_size,
            };
            staged.set_user(
                *id,
                def.param_count,
                def.result_count,
                UserFunction { block, locals },
            );
        }

        let code = relocate(&package, &code, res)?;
        let frame_size = max_stack_need(&code)?;
        debug!(package = %package, code_len = code.len(), "linked unit");
        linked.push(LinkedUnit {
            package,
            block: CodeBlock {
                code: Rc::from(code),
                constants,
                lines: Rc::new(lines),
                frame_size,
            },
            ran: false,
        });
    }
    Ok((staged, linked))
}

/// Declare a unit's globals and functions in the staged table.
fn register(
    staged: &mut StaticTable,
    exe: &Executable,
    implemented: &mut HashSet<FunctionId>,
) -> Result<Resolution, LinkError> {
    let mut res = Resolution::default();
    for def in &exe.globals {
        res.vars.push(staged.declare_var(def)?);
    }

    for def in &exe.functions {
        let id = staged.declare_function(
            &def.package,
            &def.name,
            def.param_count,
            def.result_count,
        )?;
        if def.implemented {
            let linked_before = staged.function(id).is_some_and(|f| f.is_user());
            if linked_before || !implemented.insert(id) {
                return Err(LinkError::FunctionMultipleDefine {
                    package: def.package.clone(),
                    name: def.name.clone(),
                });
            }
        }
        res.functions.push(id);
    }
    Ok(res)
}

/// Copy `code` with every static operand rewritten to its table index.
fn relocate(package: &str, code: &[u8], res: &Resolution) -> Result<Vec<u8>, LinkError> {
    let mut out = code.to_vec();
    for item in instructions(code) {
        let (offset, instr) = item?;
        let index = instr.operand as usize;
        let target = match instr.opcode.operand_kind() {
            OperandKind::Variable => res.vars.get(index).map(|id| id.0),
            OperandKind::Function => res.functions.get(index).map(|id| id.0),
            _ => continue,
        };
        let target = target.ok_or_else(|| LinkError::BadStaticIndex {
            package: package.to_string(),
            index,
            offset,
        })?;
        Instruction::with_operand(instr.opcode, target as u32)?.write_at(&mut out, offset)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_bytecode::{FunctionDef, Opcode, VariableDef};

    fn encode(instrs: &[Instruction]) -> Vec<u8> {
        let mut code = Vec::new();
        for instr in instrs {
            instr.encode(&mut code);
        }
        code
    }

    #[test]
    fn test_relocation_rewrites_static_operands_only() {
        let res = Resolution {
            vars: vec![VarId(7)],
            functions: vec![FunctionId(3), FunctionId(300)],
        };
        let code = encode(&[
            Instruction::with_operand(Opcode::PushStaticInt, 0).unwrap(),
            Instruction::with_operand(Opcode::PushFunction, 1).unwrap(),
            Instruction::with_operand(Opcode::PushInt2Byte, 1).unwrap(),
        ]);
        let out = relocate("main", &code, &res).unwrap();
        let decoded: Vec<_> = instructions(&out).map(|i| i.unwrap().1).collect();
        assert_eq!(decoded[0].operand, 7);
        assert_eq!(decoded[1].operand, 300);
        assert_eq!(decoded[2].operand, 1);
        assert_eq!(out.len(), code.len());
    }

    #[test]
    fn test_relocation_rejects_out_of_range_operand() {
        let code = encode(&[Instruction::with_operand(Opcode::PopStaticObject, 2).unwrap()]);
        let err = relocate("util", &code, &Resolution::default()).unwrap_err();
        assert_eq!(
            err,
            LinkError::BadStaticIndex {
                package: "util".into(),
                index: 2,
                offset: 0,
            }
        );
    }

    #[test]
    fn test_second_implementation_in_batch_is_rejected() {
        let mut a = Executable::new("main");
        a.add_function(FunctionDef::new("util", "f", 0, 0, vec![Opcode::Return as u8]));
        let b = a.clone();

        let table = StaticTable::new();
        let err = stage(&table, vec![a, b]).unwrap_err();
        assert!(matches!(err, LinkError::FunctionMultipleDefine { .. }));
    }

    #[test]
    fn test_shared_global_resolves_to_one_slot() {
        let mut a = Executable::new("main");
        a.add_global(VariableDef::new("main", "n", TypeTag::Int));
        let mut b = Executable::new("other");
        b.add_global(VariableDef::new("other", "m", TypeTag::Float));
        b.add_global(VariableDef::new("main", "n", TypeTag::Int));

        let mut table = StaticTable::new();
        let ra = register(&mut table, &a, &mut HashSet::new()).unwrap();
        let rb = register(&mut table, &b, &mut HashSet::new()).unwrap();
        assert_eq!(ra.vars[0], rb.vars[1]);
        assert_ne!(rb.vars[0], rb.vars[1]);
        assert_eq!(table.var_count(), 2);
    }
}
