//! # System call dispatch (C9).
//!
//! Follows the teacher's `SyscallNumber`/`TryFrom<usize>`/match-on-`Task`
//! shape exactly, widened from project 1's 7-entry file-only table to the
//! 14-entry table this crate's [`Pcb`] supports: process and thread control
//! alongside the file operations.
//!
//! File-system calls take [`FS_LOCK`] for their entire body, never across
//! more than one call, matching [`crate::file_struct`]'s documented
//! invariant. Process/thread control calls need no such lock: their own
//! state is already behind the PCB's own lock(s).
use crate::{
    file_struct::{FS_LOCK, FileDescriptor},
    pcb::UserThread,
    process,
    syscall_abi::SyscallAbi,
    uaccess::{UserCString, UserU8SliceRO, UserU8SliceWO},
};
use keos::{KernelError, syscall::Registers, syscall::flags::FileMode};

/// The closed set of system calls this crate exposes to user programs
/// (§4.8).
#[repr(usize)]
enum SyscallNumber {
    Halt = 0,
    Exit = 1,
    Exec = 2,
    Wait = 3,
    Practice = 4,
    Create = 5,
    Remove = 6,
    Open = 7,
    Filesize = 8,
    Read = 9,
    Write = 10,
    Seek = 11,
    Tell = 12,
    Close = 13,
}

impl TryFrom<usize> for SyscallNumber {
    type Error = KernelError;
    fn try_from(no: usize) -> Result<Self, Self::Error> {
        match no {
            0 => Ok(Self::Halt),
            1 => Ok(Self::Exit),
            2 => Ok(Self::Exec),
            3 => Ok(Self::Wait),
            4 => Ok(Self::Practice),
            5 => Ok(Self::Create),
            6 => Ok(Self::Remove),
            7 => Ok(Self::Open),
            8 => Ok(Self::Filesize),
            9 => Ok(Self::Read),
            10 => Ok(Self::Write),
            11 => Ok(Self::Seek),
            12 => Ok(Self::Tell),
            13 => Ok(Self::Close),
            _ => Err(KernelError::NoSuchSyscall),
        }
    }
}

/// Entry point called from [`crate::pcb::UserThread::syscall`].
///
/// A [`KernelError::BadAddress`] surfaced while decoding any argument is
/// treated specially (§7): rather than being written back as a negative
/// return value, it terminates the whole process with exit status `-1`,
/// matching the observable behavior of a user program that segfaults. Every
/// other error is returned to the caller as an ordinary negative result.
pub fn dispatch(thread: &mut UserThread, registers: &mut Registers) {
    let abi = SyscallAbi::from_registers(registers);
    let sysno = abi.sysno;
    let result = SyscallNumber::try_from(sysno).and_then(|no| run(thread, &abi, no));
    match result {
        Err(KernelError::BadAddress) => process::exit(thread, -1),
        result => abi.set_return_value(result),
    }
}

/// Two's-complement `-1`, bit-for-bit identical to what
/// [`SyscallAbi::set_return_value`] would write for a literal `-1` return
/// value — used where §4.8 mandates the literal sentinel `-1` on failure
/// rather than whichever [`KernelError`] variant happened to occur.
const NEG_ONE: usize = -1isize as usize;

fn run(thread: &mut UserThread, abi: &SyscallAbi, no: SyscallNumber) -> Result<usize, KernelError> {
    match no {
        SyscallNumber::Halt => keos::power::shutdown(),
        SyscallNumber::Exit => process::exit(thread, abi.arg1 as i32),
        SyscallNumber::Exec => {
            let cmdline = UserCString::new(abi.arg1).read()?;
            Ok(process::execute(&thread.pcb, &cmdline) as usize)
        }
        SyscallNumber::Wait => Ok(process::wait(&thread.pcb, abi.arg1 as i64) as usize),
        SyscallNumber::Practice => Ok(abi.arg1.wrapping_add(1)),
        SyscallNumber::Create => {
            let path = UserCString::new(abi.arg1).read()?;
            let fs_guard = FS_LOCK.lock();
            let mut file_struct = thread.pcb.file_struct.lock();
            let ok = file_struct.create(&path).is_ok();
            file_struct.unlock();
            fs_guard.unlock();
            Ok(ok as usize)
        }
        SyscallNumber::Remove => {
            let path = UserCString::new(abi.arg1).read()?;
            let fs_guard = FS_LOCK.lock();
            let mut file_struct = thread.pcb.file_struct.lock();
            let ok = file_struct.remove(&path).is_ok();
            file_struct.unlock();
            fs_guard.unlock();
            Ok(ok as usize)
        }
        SyscallNumber::Open => {
            let path = UserCString::new(abi.arg1).read()?;
            let fs_guard = FS_LOCK.lock();
            let mut file_struct = thread.pcb.file_struct.lock();
            let result = file_struct.open(&path, FileMode::ReadWrite);
            file_struct.unlock();
            fs_guard.unlock();
            Ok(result.map(|fd| fd.0 as usize).unwrap_or(NEG_ONE))
        }
        SyscallNumber::Filesize => {
            let fs_guard = FS_LOCK.lock();
            let file_struct = thread.pcb.file_struct.lock();
            let result = file_struct.filesize(FileDescriptor(abi.arg1 as i32));
            file_struct.unlock();
            fs_guard.unlock();
            Ok(result.unwrap_or(NEG_ONE))
        }
        SyscallNumber::Read => {
            let len = abi.arg3;
            let mut buf = alloc::vec![0u8; len];
            let fs_guard = FS_LOCK.lock();
            let mut file_struct = thread.pcb.file_struct.lock();
            let result = file_struct.read(FileDescriptor(abi.arg1 as i32), &mut buf);
            file_struct.unlock();
            fs_guard.unlock();
            match result {
                Ok(n) => UserU8SliceWO::new(abi.arg2, n).put(&buf[..n]),
                Err(_) => Ok(NEG_ONE),
            }
        }
        SyscallNumber::Write => {
            let buf = UserU8SliceRO::new(abi.arg2, abi.arg3).get()?;
            let fs_guard = FS_LOCK.lock();
            let mut file_struct = thread.pcb.file_struct.lock();
            let result = file_struct.write(FileDescriptor(abi.arg1 as i32), &buf);
            file_struct.unlock();
            fs_guard.unlock();
            Ok(result.unwrap_or(0))
        }
        SyscallNumber::Seek => {
            let fs_guard = FS_LOCK.lock();
            let mut file_struct = thread.pcb.file_struct.lock();
            file_struct.seek(FileDescriptor(abi.arg1 as i32), abi.arg2);
            file_struct.unlock();
            fs_guard.unlock();
            Ok(0)
        }
        SyscallNumber::Tell => {
            let fs_guard = FS_LOCK.lock();
            let file_struct = thread.pcb.file_struct.lock();
            let result = file_struct.tell(FileDescriptor(abi.arg1 as i32));
            file_struct.unlock();
            fs_guard.unlock();
            Ok(result.unwrap_or(NEG_ONE))
        }
        SyscallNumber::Close => {
            let fs_guard = FS_LOCK.lock();
            let mut file_struct = thread.pcb.file_struct.lock();
            file_struct.close(FileDescriptor(abi.arg1 as i32));
            file_struct.unlock();
            fs_guard.unlock();
            Ok(0)
        }
    }
}
