// sable-bytecode - Bytecode format for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Human-readable listings of executables.

use crate::constant::ConstantPool;
use crate::error::Result;
use crate::executable::{Executable, LineTable};
use crate::instruction::{Instruction, instructions};
use crate::opcode::OperandKind;

/// Render every function body and the top-level code of `exe`.
///
/// Static operands are shown with the names they refer to in this unit's own
/// descriptor lists, so the listing is only meaningful for unlinked code.
pub fn disassemble(exe: &Executable) -> Result<String> {
    let mut out = format!(
        "; package {} ({} constants, {} globals, {} functions)\n",
        exe.package,
        exe.constants.len(),
        exe.globals.len(),
        exe.functions.len()
    );

    for (i, global) in exe.globals.iter().enumerate() {
        out.push_str(&format!(
            "; global {}: {}.{} {}\n",
            i, global.package, global.name, global.ty
        ));
    }

    for func in &exe.functions {
        out.push('\n');
        if !func.implemented {
            out.push_str(&format!(
                "declare {} ({} -> {})\n",
                func.qualified_name(),
                func.param_count,
                func.result_count
            ));
            continue;
        }
        out.push_str(&format!(
            "func {} ({} -> {}, {} locals):\n",
            func.qualified_name(),
            func.param_count,
            func.result_count,
            func.locals.len()
        ));
        disassemble_code(&mut out, &func.code, &func.lines, exe)?;
    }

    out.push_str("\n<top-level>:\n");
    disassemble_code(&mut out, &exe.code, &exe.lines, exe)?;
    Ok(out)
}

/// Append a listing of one code array to `out`.
pub fn disassemble_code(
    out: &mut String,
    code: &[u8],
    lines: &LineTable,
    exe: &Executable,
) -> Result<()> {
    let mut last_line = None;
    for item in instructions(code) {
        let (offset, instr) = item?;

        let line = lines.line_for(offset);
        let line_col = match line {
            Some(n) if line != last_line => format!("{:>4}", n),
            Some(_) => "   |".to_string(),
            None => "    ".to_string(),
        };
        last_line = line;

        out.push_str(&format!("{:04} {} {}", offset, line_col, instr));
        if let Some(note) = annotate(&instr, &exe.constants, exe) {
            out.push_str(&format!("  ; {}", note));
        }
        out.push('\n');
    }
    Ok(())
}

fn annotate(instr: &Instruction, constants: &ConstantPool, exe: &Executable) -> Option<String> {
    let idx = instr.operand as usize;
    match instr.opcode.operand_kind() {
        OperandKind::Constant => Some(match constants.get(idx) {
            Ok(c) => c.to_string(),
            Err(_) => "<bad constant>".to_string(),
        }),
        OperandKind::Variable => exe
            .globals
            .get(idx)
            .map(|v| format!("{}.{}", v.package, v.name)),
        OperandKind::Function => exe.functions.get(idx).map(|f| f.qualified_name()),
        OperandKind::Short if instr.opcode.is_jump() => Some(format!("-> {:04}", idx)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::Assembler;
    use crate::error::BytecodeError;
    use crate::executable::FunctionDef;
    use crate::opcode::Opcode;

    #[test]
    fn test_listing_shows_constants_and_lines() {
        let mut exe = Executable::new("main");
        let mut asm = Assembler::new(&mut exe.constants);
        asm.set_line(3);
        asm.push_string("hi").unwrap();
        asm.emit(Opcode::Pop).unwrap();
        let (code, lines) = asm.finish();
        exe.code = code;
        exe.lines = lines;

        let text = disassemble(&exe).unwrap();
        assert!(text.contains("0000    3 PUSH_STRING 0  ; \"hi\""), "{}", text);
        assert!(text.contains("0003    | POP"), "{}", text);
    }

    #[test]
    fn test_declarations_are_listed_without_code() {
        let mut exe = Executable::new("main");
        exe.add_function(FunctionDef::declare("builtin", "println", 1, 0));
        let text = disassemble(&exe).unwrap();
        assert!(text.contains("declare builtin.println (1 -> 0)"));
    }

    #[test]
    fn test_unknown_opcode_is_an_error() {
        let mut exe = Executable::new("main");
        exe.code = vec![0xF0];
        assert_eq!(
            disassemble(&exe),
            Err(BytecodeError::UnknownOpcode {
                byte: 0xF0,
                offset: 0
            })
        );
    }
}
