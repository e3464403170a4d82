//! A single method activation: operand stack, locals, instruction pointer,
//! and the state machine (`Ready -> Running -> {Returned | Trapped}`) that
//! drives the step loop in `interp::mod`.

use crate::class::attribute::CodeAttribute;
use crate::class::constant::ConstantPool;
use crate::class::{Class, MethodInfo};
use crate::error::{CoreError, CoreResult};
use crate::gc::ObjectHandle;
use crate::interp::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Ready,
    Running,
    Returned,
    Trapped,
}

pub struct Frame<'c> {
    pub class: &'c Class,
    pub code: &'c CodeAttribute,
    pub ip: usize,
    pub locals: Vec<Value>,
    pub stack: Vec<Value>,
    pub stack_top: usize,
    pub self_ref: Option<ObjectHandle>,
    pub state: FrameState,
    pub return_value: Option<Value>,
}

impl<'c> Frame<'c> {
    /// Finds `method_name` on `class`, requires a `Code` attribute, and
    /// builds a frame with `args` copied into the low locals.
    pub fn make_frame(
        class: &'c Class,
        self_ref: Option<ObjectHandle>,
        args: &[Value],
        method_name: &str,
    ) -> CoreResult<Frame<'c>> {
        let method = find_method(class, method_name)?;
        let code = method.code().ok_or_else(|| CoreError::NoCode {
            class: class.name().unwrap_or_default(),
            method: method_name.to_string(),
        })?;

        let mut locals = vec![Value::default(); code.max_locals as usize];
        for (i, arg) in args.iter().enumerate().take(locals.len()) {
            locals[i] = *arg;
        }

        Ok(Frame {
            class,
            code,
            ip: 0,
            locals,
            stack: vec![Value::default(); code.max_stack as usize],
            stack_top: 0,
            self_ref,
            state: FrameState::Ready,
            return_value: None,
        })
    }

    pub fn push(&mut self, value: Value) -> CoreResult<()> {
        if self.stack_top >= self.stack.len() {
            return Err(CoreError::StackOverflow);
        }
        self.stack[self.stack_top] = value;
        self.stack_top += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> CoreResult<Value> {
        if self.stack_top == 0 {
            return Err(CoreError::StackUnderflow);
        }
        self.stack_top -= 1;
        Ok(self.stack[self.stack_top])
    }

    pub fn peek_mut(&mut self) -> CoreResult<&mut Value> {
        if self.stack_top == 0 {
            return Err(CoreError::StackUnderflow);
        }
        Ok(&mut self.stack[self.stack_top - 1])
    }

    pub fn local(&self, index: usize) -> CoreResult<Value> {
        self.locals.get(index).copied().ok_or(CoreError::StackUnderflow)
    }

    pub fn set_local(&mut self, index: usize, value: Value) -> CoreResult<()> {
        *self.locals.get_mut(index).ok_or(CoreError::StackUnderflow)? = value;
        Ok(())
    }

    pub fn constants(&self) -> ConstantPool {
        self.class.constants()
    }

    /// Looks the trap up in the exception table; on a match rewinds `ip` to
    /// the handler, clears the operand stack, pushes the exception value,
    /// and clears the trapped state so the step loop continues.
    ///
    /// Only a null `catchType` ("any") can match here: deciding whether a
    /// named `catchType` matches the trap requires `instanceof` over a
    /// resolved class hierarchy, which this core deliberately does not
    /// build (no class resolution into live objects). A named `catchType`
    /// entry is therefore structurally present and consulted, but never
    /// caught — the trap still propagates to the caller, which is the
    /// correct behavior for an interpreter that can't judge the match. For
    /// the same reason the pushed exception value is a `Value::Ref(None)`
    /// placeholder rather than a real allocated exception object.
    pub fn attempt_catch(&mut self) -> bool {
        for entry in &self.code.exceptions {
            if !(entry.start_pc as usize <= self.ip && (self.ip as u16) < entry.end_pc) {
                continue;
            }
            if entry.catch_type.is_some() {
                continue;
            }

            self.ip = entry.handler_pc as usize;
            self.state = FrameState::Running;
            self.stack_top = 0;
            let _ = self.push(Value::Ref(None));
            return true;
        }
        false
    }
}

fn find_method<'c>(class: &'c Class, name: &str) -> CoreResult<&'c MethodInfo> {
    let pool = class.constants();
    class
        .methods
        .iter()
        .find(|m| m.name(pool).as_deref() == Ok(name))
        .ok_or_else(|| CoreError::MethodNotFound {
            class: class.name().unwrap_or_default(),
            method: name.to_string(),
        })
}
