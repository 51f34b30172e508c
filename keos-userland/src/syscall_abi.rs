//! # System call ABI.
//!
//! User programs invoke the `syscall` instruction with the call number in
//! `%rax` and up to six arguments in `%rdi`, `%rsi`, `%rdx`, `%r10`, `%r8`,
//! `%r9`. [`SyscallAbi`] parses a trapped [`Registers`] frame into that shape
//! and, once the handler in [`crate::syscall`] has produced a result, writes
//! it back into `%rax`.
use keos::{KernelError, syscall::Registers};

/// The decoded arguments of a single system call trap.
pub struct SyscallAbi<'a> {
    /// The system call number, read from `%rax` at trap time.
    pub sysno: usize,
    /// First argument.
    pub arg1: usize,
    /// Second argument.
    pub arg2: usize,
    /// Third argument.
    pub arg3: usize,
    /// Fourth argument.
    pub arg4: usize,
    /// Fifth argument.
    pub arg5: usize,
    /// Sixth argument.
    pub arg6: usize,
    /// The trapped register frame, kept around so the return value can be
    /// written back into it.
    pub regs: &'a mut Registers,
}

impl<'a> SyscallAbi<'a> {
    /// Decode a [`SyscallAbi`] out of a trapped register frame.
    pub fn from_registers(regs: &'a mut Registers) -> Self {
        let gprs = &regs.gprs;
        Self {
            sysno: gprs.rax,
            arg1: gprs.rdi,
            arg2: gprs.rsi,
            arg3: gprs.rdx,
            arg4: gprs.r10,
            arg5: gprs.r8,
            arg6: gprs.r9,
            regs,
        }
    }

    /// Write the result of the system call back into `%rax`.
    ///
    /// Successful calls return their value as-is; failed calls return the
    /// negative errno-like code from [`KernelError::into_usize`].
    pub fn set_return_value(self, return_val: Result<usize, KernelError>) {
        self.regs.gprs.rax = match return_val {
            Ok(v) => v,
            Err(e) => e.into_usize(),
        };
    }
}
