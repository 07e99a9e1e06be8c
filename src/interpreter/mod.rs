//! Register protocol interpreter
//!
//! Turns host bytes into register reads and writes. Replies go to the
//! TX ring; register traffic goes through a [`RegisterBus`].
//!
//! ```text
//! bytes ──▶ Tokenizer ──▶ Token ──┬─ Literal/Name ──▶ ValueStack
//!                                 └─ Opcode ────────▶ execute ──▶ reply + CR LF
//! ```
//!
//! Zero heap allocation. Malformed input never stops the interpreter.

pub mod command;
pub mod tokenizer;

pub use command::{classify, execute, Context, Opcode, ValueStack, OPCODES};
pub use tokenizer::{Token, TokenState, Tokenizer, TOKEN_CAPACITY};

use core::fmt::Write;

use crate::log_globals::LOG_STREAM;
use crate::registers::{parse_hex_pair, RegisterAddress, RegisterBus};
use crate::tx_ring::TxRing;

/// Protocol state machine.
pub struct Interpreter {
    tokens: Tokenizer,
    stack: ValueStack,
    who: &'static str,
}

impl Interpreter {
    /// Create an interpreter answering `@` with `who`.
    pub const fn new(who: &'static str) -> Self {
        Self {
            tokens: Tokenizer::new(),
            stack: ValueStack::new(),
            who,
        }
    }

    /// Operand stack.
    pub fn stack(&self) -> &ValueStack {
        &self.stack
    }

    /// Tokenizer state (a partial token may span chunks).
    pub fn token_state(&self) -> TokenState {
        self.tokens.state()
    }

    /// Process one chunk of host bytes.
    pub fn feed<B, const N: usize>(&mut self, data: &[u8], bus: &mut B, tx: &TxRing<N>, now_us: i64)
    where
        B: RegisterBus,
    {
        for &byte in data {
            self.process_byte(byte, bus, tx, now_us);
        }
    }

    fn process_byte<B, const N: usize>(&mut self, byte: u8, bus: &mut B, tx: &TxRing<N>, now_us: i64)
    where
        B: RegisterBus,
    {
        let Some(token) = self.tokens.push(byte) else {
            return;
        };

        match token {
            Token::Opcode(symbol) => {
                let mut out = tx.writer();
                let mut ctx = Context {
                    stack: self.stack,
                    bus,
                    who: self.who,
                };

                if let Err(e) = execute(symbol, &mut ctx, &mut out) {
                    crate::rt_warn!(LOG_STREAM, now_us, "'{}' failed: {}", symbol as char, e);
                    let _ = out.write_char('!');
                }
                let _ = out.write_str("\r\n");
            }
            Token::Literal(hi, lo) => {
                let (value, valid) = parse_hex_pair(hi, lo);
                if !valid {
                    crate::rt_warn!(
                        LOG_STREAM,
                        now_us,
                        "non-hex literal {}{} -> {:02X}",
                        hi as char,
                        lo as char,
                        value
                    );
                }
                self.stack.push(value);
            }
            Token::Name(name) => {
                let addr = RegisterAddress::resolve(name);
                if addr == RegisterAddress::INVALID {
                    crate::rt_debug!(LOG_STREAM, now_us, "unknown register name, using {}", addr);
                }
                self.stack.push(addr.0);
            }
        }
    }
}
