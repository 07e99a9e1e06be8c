//! Register map for the command interpreter.
//!
//! Host commands address 8-bit registers. Instead of dereferencing the
//! address, every access goes through [`REGISTER_TABLE`], which routes a
//! validated address to a typed accessor:
//!
//! ```text
//! 0x00..=0x1F  general purpose scratch registers
//! 0x30..=0x3B  PINx / DDRx / PORTx for ports D, C, B, A
//! ```
//!
//! Everything else, including the `0x20` "bad name" sentinel, is unmapped.

use core::fmt;

/// Sentinel produced by an unresolvable register name.
pub const INVALID_ADDRESS: u8 = 0x20;

/// Number of scratch registers.
pub const GENERAL_REGISTERS: usize = 32;

/// An 8-bit register address as typed by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RegisterAddress(pub u8);

impl RegisterAddress {
    /// Sentinel for a name that did not resolve.
    pub const INVALID: Self = Self(INVALID_ADDRESS);

    /// Resolve a symbolic name such as `PORTB`, `DDRA` or `PINC`.
    ///
    /// `name` must already be upper case. The last byte selects the port,
    /// the rest selects the register; anything unknown maps to
    /// [`RegisterAddress::INVALID`].
    pub fn resolve(name: &[u8]) -> Self {
        let Some((&letter, prefix)) = name.split_last() else {
            return Self::INVALID;
        };
        let Some(port) = Port::from_letter(letter) else {
            return Self::INVALID;
        };
        let Some(reg) = PortRegister::from_prefix(prefix) else {
            return Self::INVALID;
        };

        Self(port.base() + reg.offset())
    }
}

impl fmt::Display for RegisterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// Convert a hex digit without validation.
///
/// Valid digits map to 0..=15. Other bytes produce garbage but never fail.
#[inline]
pub fn nibble(digit: u8) -> u8 {
    let n = digit.wrapping_sub(b'0');
    if n > 9 {
        n.wrapping_sub(7)
    } else {
        n
    }
}

/// Parse a two-character hex literal.
///
/// Returns the value and whether both characters were hex digits.
#[inline]
pub fn parse_hex_pair(hi: u8, lo: u8) -> (u8, bool) {
    let valid = hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit();
    ((nibble(hi) << 4) | nibble(lo), valid)
}

/// I/O port letter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Port {
    A,
    B,
    C,
    D,
}

impl Port {
    pub const ALL: [Port; 4] = [Port::A, Port::B, Port::C, Port::D];

    /// Parse an upper-case port letter.
    pub fn from_letter(letter: u8) -> Option<Self> {
        match letter {
            b'A' => Some(Port::A),
            b'B' => Some(Port::B),
            b'C' => Some(Port::C),
            b'D' => Some(Port::D),
            _ => None,
        }
    }

    /// Address of this port's PIN register.
    #[inline]
    pub const fn base(self) -> u8 {
        0x30 + (3 - self as u8) * 3
    }

    /// Position in per-port arrays.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn letter(self) -> char {
        (b'A' + self as u8) as char
    }
}

/// Register within a port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortRegister {
    /// Input levels (read only).
    Pin,
    /// Direction, 1 = output.
    Ddr,
    /// Output latch.
    Port,
}

impl PortRegister {
    fn from_prefix(prefix: &[u8]) -> Option<Self> {
        match prefix {
            b"PIN" => Some(PortRegister::Pin),
            b"DDR" => Some(PortRegister::Ddr),
            b"PORT" => Some(PortRegister::Port),
            _ => None,
        }
    }

    #[inline]
    pub const fn offset(self) -> u8 {
        match self {
            PortRegister::Pin => 0,
            PortRegister::Ddr => 1,
            PortRegister::Port => 2,
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            PortRegister::Pin => "PIN",
            PortRegister::Ddr => "DDR",
            PortRegister::Port => "PORT",
        }
    }
}

/// Typed accessor behind an address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Register {
    /// Scratch register `n`.
    General(u8),
    /// Port register.
    Io(Port, PortRegister),
}

/// Table entry: a contiguous address range with one accessor kind.
pub struct RegisterDescriptor {
    pub first: u8,
    pub last: u8,
    pub brief: &'static str,
    pub register: fn(u8) -> Register,
}

/// All mapped registers.
pub static REGISTER_TABLE: &[RegisterDescriptor] = &[
    RegisterDescriptor { first: 0x00, last: 0x1F, brief: "general purpose", register: Register::General },
    RegisterDescriptor { first: 0x30, last: 0x32, brief: "port D", register: |a| io(Port::D, a - 0x30) },
    RegisterDescriptor { first: 0x33, last: 0x35, brief: "port C", register: |a| io(Port::C, a - 0x33) },
    RegisterDescriptor { first: 0x36, last: 0x38, brief: "port B", register: |a| io(Port::B, a - 0x36) },
    RegisterDescriptor { first: 0x39, last: 0x3B, brief: "port A", register: |a| io(Port::A, a - 0x39) },
];

fn io(port: Port, offset: u8) -> Register {
    let reg = match offset {
        0 => PortRegister::Pin,
        1 => PortRegister::Ddr,
        _ => PortRegister::Port,
    };
    Register::Io(port, reg)
}

/// Find the accessor for an address.
pub fn lookup(addr: RegisterAddress) -> Option<Register> {
    REGISTER_TABLE
        .iter()
        .find(|d| (d.first..=d.last).contains(&addr.0))
        .map(|d| (d.register)(addr.0))
}

/// Register access error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    /// R01: No register at this address
    Unmapped(RegisterAddress),
    /// R02: Register cannot be written
    ReadOnly(RegisterAddress),
}

impl RegisterError {
    /// Get error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unmapped(_) => "R01",
            Self::ReadOnly(_) => "R02",
        }
    }

    /// Get error message
    pub fn message(&self) -> &'static str {
        match self {
            Self::Unmapped(_) => "unmapped register",
            Self::ReadOnly(_) => "read-only register",
        }
    }

    pub fn address(&self) -> RegisterAddress {
        match *self {
            Self::Unmapped(a) | Self::ReadOnly(a) => a,
        }
    }
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {}", self.code(), self.message(), self.address())
    }
}

/// Byte-wide access to the GPIO lanes behind ports A..D.
pub trait PortIo {
    /// Current pin levels.
    fn pins(&self, port: Port) -> u8;
    /// Direction register, 1 = output.
    fn direction(&self, port: Port) -> u8;
    fn set_direction(&mut self, port: Port, value: u8);
    /// Output latch.
    fn output(&self, port: Port) -> u8;
    fn set_output(&mut self, port: Port, value: u8);
}

/// Register access as seen by the interpreter.
pub trait RegisterBus {
    fn read(&mut self, addr: RegisterAddress) -> Result<u8, RegisterError>;
    fn write(&mut self, addr: RegisterAddress, value: u8) -> Result<(), RegisterError>;
}

/// [`RegisterBus`] over the static table.
pub struct RegisterMap<P: PortIo> {
    general: [u8; GENERAL_REGISTERS],
    ports: P,
}

impl<P: PortIo> RegisterMap<P> {
    pub fn new(ports: P) -> Self {
        Self {
            general: [0; GENERAL_REGISTERS],
            ports,
        }
    }

    pub fn ports(&self) -> &P {
        &self.ports
    }

    pub fn ports_mut(&mut self) -> &mut P {
        &mut self.ports
    }
}

impl<P: PortIo> RegisterBus for RegisterMap<P> {
    fn read(&mut self, addr: RegisterAddress) -> Result<u8, RegisterError> {
        match lookup(addr).ok_or(RegisterError::Unmapped(addr))? {
            Register::General(n) => Ok(self.general[n as usize]),
            Register::Io(port, PortRegister::Pin) => Ok(self.ports.pins(port)),
            Register::Io(port, PortRegister::Ddr) => Ok(self.ports.direction(port)),
            Register::Io(port, PortRegister::Port) => Ok(self.ports.output(port)),
        }
    }

    fn write(&mut self, addr: RegisterAddress, value: u8) -> Result<(), RegisterError> {
        match lookup(addr).ok_or(RegisterError::Unmapped(addr))? {
            Register::General(n) => self.general[n as usize] = value,
            Register::Io(_, PortRegister::Pin) => return Err(RegisterError::ReadOnly(addr)),
            Register::Io(port, PortRegister::Ddr) => self.ports.set_direction(port, value),
            Register::Io(port, PortRegister::Port) => self.ports.set_output(port, value),
        }
        Ok(())
    }
}

/// In-memory ports for the host simulator and tests.
///
/// Pins configured as outputs read back the output latch, inputs read the
/// externally driven level.
#[derive(Clone, Debug)]
pub struct SimulatedPorts {
    external: [u8; 4],
    ddr: [u8; 4],
    output: [u8; 4],
}

impl SimulatedPorts {
    /// All pins floating high (pull-ups), all inputs.
    pub const fn new() -> Self {
        Self {
            external: [0xFF; 4],
            ddr: [0; 4],
            output: [0; 4],
        }
    }

    /// Drive the input side of a port.
    pub fn set_external(&mut self, port: Port, levels: u8) {
        self.external[port.index()] = levels;
    }
}

impl Default for SimulatedPorts {
    fn default() -> Self {
        Self::new()
    }
}

impl PortIo for SimulatedPorts {
    fn pins(&self, port: Port) -> u8 {
        let i = port.index();
        (self.output[i] & self.ddr[i]) | (self.external[i] & !self.ddr[i])
    }

    fn direction(&self, port: Port) -> u8 {
        self.ddr[port.index()]
    }

    fn set_direction(&mut self, port: Port, value: u8) {
        self.ddr[port.index()] = value;
    }

    fn output(&self, port: Port) -> u8 {
        self.output[port.index()]
    }

    fn set_output(&mut self, port: Port, value: u8) {
        self.output[port.index()] = value;
    }
}
