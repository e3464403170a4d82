//! The frame-based bytecode interpreter: a step loop over a documented
//! opcode subset, dispatching on the raw byte each `Code` attribute holds.
//! Unrecognized opcodes are logged and skipped rather than treated as a
//! hard error, matching the source's existing tolerance for unimplemented
//! instructions elsewhere in the corpus.

pub mod frame;
pub mod value;

use crate::error::{CoreError, CoreResult};
use crate::interp::frame::{Frame, FrameState};
use crate::interp::value::Value;

const ACONST_NULL: u8 = 0x01;
const ICONST_M1: u8 = 0x02;
const ICONST_0: u8 = 0x03;
const ICONST_5: u8 = 0x08;
const ILOAD: u8 = 0x15;
const ILOAD_0: u8 = 0x1A;
const ILOAD_3: u8 = 0x1D;
const ISTORE: u8 = 0x36;
const ISTORE_0: u8 = 0x3B;
const ISTORE_3: u8 = 0x3E;
const IADD: u8 = 0x60;
const ISUB: u8 = 0x64;
const IMUL: u8 = 0x68;
const IDIV: u8 = 0x6C;
const IREM: u8 = 0x70;
const INEG: u8 = 0x74;
const IAND: u8 = 0x7E;
const IOR: u8 = 0x80;
const IRETURN: u8 = 0xAC;

/// Runs `frame` to completion, returning the value `ireturn` produced (if
/// any) or propagating the first uncaught trap.
pub fn run(frame: &mut Frame) -> CoreResult<Option<Value>> {
    frame.state = FrameState::Running;

    loop {
        match step(frame) {
            Ok(()) => {}
            Err(error) => {
                frame.state = FrameState::Trapped;
                if frame.attempt_catch() {
                    continue;
                }
                return Err(error);
            }
        }

        match frame.state {
            FrameState::Returned => return Ok(frame.return_value),
            FrameState::Trapped => return Err(CoreError::StackUnderflow),
            _ => {}
        }
    }
}

/// Executes one instruction at `frame.ip`, advancing `ip` by the
/// instruction's width unless it returned.
fn step(frame: &mut Frame) -> CoreResult<()> {
    if frame.ip >= frame.code.code.len() {
        return Err(CoreError::StackUnderflow);
    }

    let op = frame.code.code[frame.ip];
    let start_ip = frame.ip;

    match op {
        ACONST_NULL => frame.push(Value::Ref(None))?,

        ICONST_M1 => frame.push(Value::Int(-1))?,
        ICONST_0..=ICONST_5 => frame.push(Value::Int((op - ICONST_0) as i32))?,

        ILOAD_0..=ILOAD_3 => {
            let index = (op - ILOAD_0) as usize;
            frame.push(frame.local(index)?)?;
        }
        ILOAD => {
            let index = fetch_u8(frame, start_ip)? as usize;
            frame.push(frame.local(index)?)?;
        }

        ISTORE_0..=ISTORE_3 => {
            let index = (op - ISTORE_0) as usize;
            let value = frame.pop()?;
            frame.set_local(index, value)?;
        }
        ISTORE => {
            let index = fetch_u8(frame, start_ip)? as usize;
            let value = frame.pop()?;
            frame.set_local(index, value)?;
        }

        IADD => binary_int(frame, |a, b| Ok(a.wrapping_add(b)))?,
        ISUB => binary_int(frame, |a, b| Ok(a.wrapping_sub(b)))?,
        IMUL => binary_int(frame, |a, b| Ok(a.wrapping_mul(b)))?,
        IDIV => binary_int(frame, |a, b| {
            if b == 0 {
                Err(CoreError::DivisionByZero)
            } else {
                Ok(a.wrapping_div(b))
            }
        })?,
        IREM => binary_int(frame, |a, b| {
            if b == 0 {
                Err(CoreError::DivisionByZero)
            } else {
                Ok(a.wrapping_rem(b))
            }
        })?,
        INEG => {
            let value = int_operand(frame.peek_mut()?)?;
            *frame.peek_mut()? = Value::Int(0i32.wrapping_sub(value));
        }
        IAND => binary_int(frame, |a, b| Ok(a & b))?,
        IOR => binary_int(frame, |a, b| Ok(a | b))?,

        IRETURN => {
            let value = frame.pop()?;
            frame.return_value = Some(value);
            frame.state = FrameState::Returned;
            return Ok(());
        }

        other => {
            warn!("unrecognized opcode {:#04x} at ip {}, treating as a 1-byte no-op", other, start_ip);
        }
    }

    if frame.ip == start_ip {
        frame.ip += instruction_width(op);
    }
    Ok(())
}

fn instruction_width(op: u8) -> usize {
    match op {
        ILOAD | ISTORE => 2,
        _ => 1,
    }
}

fn fetch_u8(frame: &Frame, op_ip: usize) -> CoreResult<u8> {
    frame
        .code
        .code
        .get(op_ip + 1)
        .copied()
        .ok_or(CoreError::StackUnderflow)
}

fn int_operand(value: &Value) -> CoreResult<i32> {
    value.as_int().ok_or(CoreError::StackUnderflow)
}

fn binary_int(frame: &mut Frame, f: impl FnOnce(i32, i32) -> CoreResult<i32>) -> CoreResult<()> {
    let b = int_operand(&frame.pop()?)?;
    let a = int_operand(frame.peek_mut()?)?;
    let result = f(a, b)?;
    *frame.peek_mut()? = Value::Int(result);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::attribute::{Attribute, CodeAttribute, ExceptionEntry};
    use crate::class::constant::Constant;
    use crate::class::{AccessFlags, Class, MethodInfo};

    fn class_with_code(code: Vec<u8>, max_locals: u16) -> Class {
        class_with_code_and_handler(code, max_locals, Vec::new())
    }

    fn class_with_code_and_handler(code: Vec<u8>, max_locals: u16, exceptions: Vec<ExceptionEntry>) -> Class {
        let code_attr = CodeAttribute {
            max_stack: 8,
            max_locals,
            code,
            exceptions,
            attributes: Vec::new(),
        };

        let method = MethodInfo {
            access: AccessFlags::STATIC,
            name_index: 1,
            descriptor_index: 2,
            attributes: vec![Attribute::Code(code_attr)],
        };

        Class {
            minor_version: 0,
            major_version: 52,
            constants: vec![
                Constant::Utf8("run".to_string()),
                Constant::Utf8("()I".to_string()),
                Constant::Utf8("Main".to_string()),
                Constant::Class { name_index: 3 },
            ],
            access_flags: AccessFlags::PUBLIC,
            this_class: 4,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: vec![method],
            attributes: Vec::new(),
        }
    }

    fn run_method(class: &Class, args: &[Value]) -> CoreResult<Option<Value>> {
        let mut frame = Frame::make_frame(class, None, args, "run")?;
        run(&mut frame)
    }

    #[test]
    fn adds_two_locals_and_returns() {
        // iload_0, iload_1, iadd, ireturn
        let class = class_with_code(vec![0x1A, 0x1B, IADD, IRETURN], 2);
        let result = run_method(&class, &[Value::Int(2), Value::Int(40)]).unwrap();
        assert_eq!(result, Some(Value::Int(42)));
    }

    #[test]
    fn subtracts_in_operand_order_not_push_order() {
        // iload_1, iload_0, isub, ireturn: locals[1] - locals[0]
        let class = class_with_code(vec![0x1B, 0x1A, ISUB, IRETURN], 2);
        let result = run_method(&class, &[Value::Int(5), Value::Int(2)]).unwrap();
        assert_eq!(result, Some(Value::Int(-3)));
    }

    #[test]
    fn division_by_zero_traps() {
        // iconst_5, iconst_0, idiv, ireturn
        let class = class_with_code(vec![0x08, 0x03, IDIV, IRETURN], 0);
        match run_method(&class, &[]) {
            Err(CoreError::DivisionByZero) => {}
            other => panic!("expected DivisionByZero, got {:?}", other),
        }
    }

    #[test]
    fn exception_table_catches_a_trap_and_pushes_a_placeholder_value() {
        // iconst_5, iconst_0, idiv, iconst_m1, ireturn; a null-catch handler
        // at the iconst_m1 covers the idiv trap.
        let code = vec![0x08, 0x03, IDIV, ICONST_M1, IRETURN];
        let handler = ExceptionEntry {
            start_pc: 0,
            end_pc: 3,
            handler_pc: 3,
            catch_type: None,
        };
        let class = class_with_code_and_handler(code, 0, vec![handler]);

        let result = run_method(&class, &[]).unwrap();
        // the exception placeholder sits below the handler's own iconst_m1;
        // ireturn only ever pops the top of the stack.
        assert_eq!(result, Some(Value::Int(-1)));
    }

    #[test]
    fn unknown_opcode_is_skipped_as_a_noop() {
        // 0xFE (undefined), iconst_m1, ireturn
        let class = class_with_code(vec![0xFE, ICONST_M1, IRETURN], 0);
        let result = run_method(&class, &[]).unwrap();
        assert_eq!(result, Some(Value::Int(-1)));
    }

    #[test]
    fn istore_then_iload_round_trips_through_locals() {
        // iconst_5, istore 0, iload 0, ineg, ireturn
        let class = class_with_code(vec![0x08, ISTORE, 0x00, ILOAD, 0x00, INEG, IRETURN], 1);
        let result = run_method(&class, &[]).unwrap();
        assert_eq!(result, Some(Value::Int(-5)));
    }

    #[test]
    fn stack_underflow_on_malformed_pop() {
        // ireturn with nothing pushed
        let class = class_with_code(vec![IRETURN], 0);
        match run_method(&class, &[]) {
            Err(CoreError::StackUnderflow) => {}
            other => panic!("expected StackUnderflow, got {:?}", other),
        }
    }
}
