// sable-bytecode - Image format tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use sable_bytecode::{
    Assembler, BytecodeError, Executable, FunctionDef, IMAGE_MAGIC, LocalVariable, Opcode,
    TypeTag, VariableDef, decode_image, disassemble, encode_image,
};

fn sample_unit() -> Executable {
    let mut exe = Executable::new("main");
    let counter = exe.add_global(VariableDef::new("main", "counter", TypeTag::Int));
    let println = exe.add_function(FunctionDef::declare("builtin", "println", 1, 0));

    let mut asm = Assembler::new(&mut exe.constants);
    asm.set_line(2);
    asm.push_string("hello").unwrap();
    asm.emit_with(Opcode::PushFunction, println as u32).unwrap();
    asm.emit(Opcode::Invoke).unwrap();
    asm.set_line(3);
    asm.emit_with(Opcode::PushStaticInt, counter as u32).unwrap();
    asm.emit(Opcode::Return).unwrap();
    let (code, lines) = asm.finish();

    let main = FunctionDef::new("main", "main", 0, 1, code)
        .with_locals(vec![LocalVariable::new("tmp", TypeTag::String)])
        .with_lines(lines);
    exe.add_function(main);

    let mut asm = Assembler::new(&mut exe.constants);
    asm.push_int(41).unwrap();
    asm.emit(Opcode::Increment).unwrap();
    asm.emit_with(Opcode::PopStaticInt, counter as u32).unwrap();
    let (code, lines) = asm.finish();
    exe.code = code;
    exe.lines = lines;
    exe
}

#[test]
fn test_image_roundtrip() {
    let units = vec![sample_unit(), Executable::new("util")];
    let bytes = encode_image(&units).unwrap();
    assert_eq!(&bytes[..4], &IMAGE_MAGIC);
    assert_eq!(decode_image(&bytes).unwrap(), units);
}

#[test]
fn test_image_rejects_wrong_magic() {
    let mut bytes = encode_image(&[sample_unit()]).unwrap();
    bytes[0] = b'X';
    assert_eq!(decode_image(&bytes), Err(BytecodeError::BadMagic));
}

#[test]
fn test_image_rejects_future_version() {
    let mut bytes = encode_image(&[sample_unit()]).unwrap();
    bytes[4] = 0;
    bytes[5] = 9;
    assert_eq!(
        decode_image(&bytes),
        Err(BytecodeError::UnsupportedVersion(9))
    );
}

#[test]
fn test_disassembly_names_statics() {
    let text = disassemble(&sample_unit()).unwrap();
    assert!(text.contains("func main.main (0 -> 1, 1 locals):"), "{}", text);
    assert!(text.contains("PUSH_FUNCTION 0  ; builtin.println"), "{}", text);
    assert!(text.contains("PUSH_STATIC_INT 0  ; main.counter"), "{}", text);
    assert!(text.contains("<top-level>:"), "{}", text);
    assert!(text.contains("INCREMENT"), "{}", text);
}
