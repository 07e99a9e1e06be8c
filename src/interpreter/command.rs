//! Opcode table and handlers

use core::fmt::Write;

use crate::registers::{RegisterAddress, RegisterBus, RegisterError};

/// Protocol opcodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    Who,
    Get,
    Set,
    SetTwice,
    AndSet,
    OrSet,
    XorSet,
    Error,
}

/// The three most recent operands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ValueStack {
    /// Top of stack, the target address for every command.
    pub tos: u8,
    /// First operand.
    pub val: u8,
    /// Second operand (`$` only).
    pub val2: u8,
}

impl ValueStack {
    pub const fn new() -> Self {
        Self { tos: 0, val: 0, val2: 0 }
    }

    /// Shift a new value in: `val2 <- val <- tos <- value`.
    #[inline]
    pub fn push(&mut self, value: u8) {
        self.val2 = self.val;
        self.val = self.tos;
        self.tos = value;
    }

    /// Address named by `tos`.
    #[inline]
    pub fn address(&self) -> RegisterAddress {
        RegisterAddress(self.tos)
    }
}

/// Everything a handler can touch.
pub struct Context<'a> {
    pub stack: ValueStack,
    pub bus: &'a mut dyn RegisterBus,
    pub who: &'a str,
}

/// Opcode descriptor
pub struct OpcodeDescriptor {
    pub symbol: u8,
    pub opcode: Opcode,
    pub brief: &'static str,
    pub handler: fn(&mut Context<'_>, &mut dyn Write) -> Result<(), RegisterError>,
}

/// All single-character commands
pub static OPCODES: &[OpcodeDescriptor] = &[
    OpcodeDescriptor { symbol: b'@', opcode: Opcode::Who, brief: "identify device", handler: op_who },
    OpcodeDescriptor { symbol: b'?', opcode: Opcode::Get, brief: "read register tos", handler: op_get },
    OpcodeDescriptor { symbol: b'=', opcode: Opcode::Set, brief: "write val to tos", handler: op_set },
    OpcodeDescriptor { symbol: b'$', opcode: Opcode::SetTwice, brief: "write val then val2 to tos", handler: op_set_twice },
    OpcodeDescriptor { symbol: b'&', opcode: Opcode::AndSet, brief: "tos &= val", handler: op_and },
    OpcodeDescriptor { symbol: b'|', opcode: Opcode::OrSet, brief: "tos |= val", handler: op_or },
    OpcodeDescriptor { symbol: b'^', opcode: Opcode::XorSet, brief: "tos ^= val", handler: op_xor },
];

/// Classify an opcode character.
pub fn classify(symbol: u8) -> Opcode {
    find(symbol).map(|d| d.opcode).unwrap_or(Opcode::Error)
}

fn find(symbol: u8) -> Option<&'static OpcodeDescriptor> {
    OPCODES.iter().find(|d| d.symbol == symbol)
}

/// Execute one opcode and write its reply, without the trailing CR LF.
///
/// Unknown opcodes reply `!`. A register error is returned untouched; the
/// caller decides how to report it.
pub fn execute(symbol: u8, ctx: &mut Context<'_>, out: &mut dyn Write) -> Result<Opcode, RegisterError> {
    match find(symbol) {
        Some(d) => {
            (d.handler)(ctx, out)?;
            Ok(d.opcode)
        }
        None => {
            let _ = out.write_char('!');
            Ok(Opcode::Error)
        }
    }
}

// --- Opcode Implementations ---

fn op_who(ctx: &mut Context<'_>, out: &mut dyn Write) -> Result<(), RegisterError> {
    let _ = out.write_str(ctx.who);
    Ok(())
}

fn op_get(ctx: &mut Context<'_>, out: &mut dyn Write) -> Result<(), RegisterError> {
    let value = ctx.bus.read(ctx.stack.address())?;
    let _ = write!(out, "{:02X}", value);
    Ok(())
}

fn op_set(ctx: &mut Context<'_>, _out: &mut dyn Write) -> Result<(), RegisterError> {
    let (addr, val) = (ctx.stack.address(), ctx.stack.val);
    critical_section::with(|_cs| ctx.bus.write(addr, val))
}

fn op_set_twice(ctx: &mut Context<'_>, _out: &mut dyn Write) -> Result<(), RegisterError> {
    let ValueStack { val, val2, .. } = ctx.stack;
    let addr = ctx.stack.address();
    critical_section::with(|_cs| {
        ctx.bus.write(addr, val)?;
        ctx.bus.write(addr, val2)
    })
}

fn op_and(ctx: &mut Context<'_>, _out: &mut dyn Write) -> Result<(), RegisterError> {
    modify(ctx, |x, v| x & v)
}

fn op_or(ctx: &mut Context<'_>, _out: &mut dyn Write) -> Result<(), RegisterError> {
    modify(ctx, |x, v| x | v)
}

fn op_xor(ctx: &mut Context<'_>, _out: &mut dyn Write) -> Result<(), RegisterError> {
    modify(ctx, |x, v| x ^ v)
}

/// Read-modify-write with interrupts masked.
fn modify(ctx: &mut Context<'_>, f: fn(u8, u8) -> u8) -> Result<(), RegisterError> {
    let (addr, val) = (ctx.stack.address(), ctx.stack.val);
    critical_section::with(|_cs| {
        let current = ctx.bus.read(addr)?;
        ctx.bus.write(addr, f(current, val))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_shifts() {
        let mut stack = ValueStack::new();
        stack.push(1);
        stack.push(2);
        stack.push(3);
        assert_eq!(stack, ValueStack { tos: 3, val: 2, val2: 1 });

        stack.push(4);
        assert_eq!(stack, ValueStack { tos: 4, val: 3, val2: 2 });
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(b'@'), Opcode::Who);
        assert_eq!(classify(b'$'), Opcode::SetTwice);
        assert_eq!(classify(b'^'), Opcode::XorSet);
        assert_eq!(classify(b'#'), Opcode::Error);
        assert_eq!(classify(b'X'), Opcode::Error);
    }

    #[test]
    fn test_opcode_table_symbols_unique() {
        for (i, a) in OPCODES.iter().enumerate() {
            for b in &OPCODES[i + 1..] {
                assert_ne!(a.symbol, b.symbol, "duplicate opcode {}", a.symbol as char);
            }
        }
    }
}
