//! Stream tokenizer for the register protocol.
//!
//! Bytes above 0x20 accumulate into a token, anything else is a delimiter.
//! The token length at the delimiter decides what the token is:
//!
//! | length | token            |
//! |--------|------------------|
//! | 0      | ignored          |
//! | 1      | opcode           |
//! | 2      | hex literal      |
//! | 3      | keep accumulating|
//! | 4..    | register name    |
//!
//! State survives across input chunks.

/// Token buffer size. Longer tokens wrap and keep overwriting from the start.
pub const TOKEN_CAPACITY: usize = 8;

/// Tokenizer state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenState {
    /// No bytes since the last classified token.
    Idle,
    /// `n` bytes collected (1..TOKEN_CAPACITY).
    Accumulating(u8),
}

/// A classified token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token<'a> {
    /// Single character command.
    Opcode(u8),
    /// Two-character hex literal (high, low digit).
    Literal(u8, u8),
    /// Register name, four characters or more.
    Name(&'a [u8]),
}

/// Byte-at-a-time tokenizer.
pub struct Tokenizer {
    buf: [u8; TOKEN_CAPACITY],
    state: TokenState,
}

impl Tokenizer {
    pub const fn new() -> Self {
        Self {
            buf: [0u8; TOKEN_CAPACITY],
            state: TokenState::Idle,
        }
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> TokenState {
        self.state
    }

    /// Feed one byte.
    ///
    /// Returns a token when a delimiter completes one.
    pub fn push(&mut self, byte: u8) -> Option<Token<'_>> {
        if byte > 0x20 {
            self.accumulate(byte.to_ascii_uppercase());
            return None;
        }

        match self.state {
            TokenState::Idle => None,
            TokenState::Accumulating(1) => {
                self.state = TokenState::Idle;
                Some(Token::Opcode(self.buf[0]))
            }
            TokenState::Accumulating(2) => {
                self.state = TokenState::Idle;
                Some(Token::Literal(self.buf[0], self.buf[1]))
            }
            TokenState::Accumulating(3) => None,
            TokenState::Accumulating(n) => {
                self.state = TokenState::Idle;
                Some(Token::Name(&self.buf[..n as usize]))
            }
        }
    }

    /// Drop any partial token.
    pub fn reset(&mut self) {
        self.state = TokenState::Idle;
    }

    fn accumulate(&mut self, byte: u8) {
        let len = match self.state {
            TokenState::Idle => 0,
            TokenState::Accumulating(n) => n as usize,
        };

        self.buf[len] = byte;
        let next = (len + 1) % TOKEN_CAPACITY;
        self.state = if next == 0 {
            TokenState::Idle
        } else {
            TokenState::Accumulating(next as u8)
        };
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}
