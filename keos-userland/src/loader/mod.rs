//! # Program loader and argument packer (C6).
//!
//! Turns a command-line string into a freshly loaded address space and an
//! initial [`Registers`] frame ready to [`Registers::launch`] into user mode:
//! parse and validate the ELF header, install each `PT_LOAD` segment,
//! install one zeroed stack page, and lay out `argc`/`argv` on it following
//! the x86 C ABI exactly as a classic i386 `_start` expects to find them.
//!
//! This plays the role the teacher's `LoadContext`/`StackBuilder` pair
//! played, collapsed around a concrete [`AddressSpace`] instead of a generic
//! `MmStruct<P>`, and narrowed to the single page of stack this crate's
//! syscall surface needs — there is no `sbrk`/additional-mapping call that
//! would ever ask for more.
pub mod elf;

use crate::mm::AddressSpace;
use alloc::vec::Vec;
use elf::{Elf, PType};
use keos::{
    KernelError,
    addressing::{PAGE_MASK, Va},
    fs::RegularFile,
    mm::page_table::Permission,
    syscall::Registers,
};

/// Top of user virtual memory. Fixed, as in the teacher's `StackBuilder`:
/// every process's stack starts at exactly this address and grows down.
pub const STACK_TOP: usize = 0x4748_0000;

/// The stack is exactly one page; anything the loader cannot fit below
/// [`STACK_TOP`] and above this address is a load failure, not a second
/// page grown on demand.
const STACK_BOTTOM: usize = STACK_TOP - 0x1000;

/// The outcome of a successful [`load`]: an address space with the program
/// installed, and the register frame that will start it.
pub struct Loaded {
    pub address_space: AddressSpace,
    pub regs: Registers,
    /// The executable, left open so the caller can keep it pinned in the
    /// PCB for the process's lifetime.
    pub exec_file: RegularFile,
}

/// Load the program named by the first token of `cmdline` and lay out
/// `cmdline`'s tokens as its `argv`.
///
/// On any failure the partially built address space and any opened file are
/// dropped before returning, per §4.5's "on any failure" clause.
pub fn load(cmdline: &str) -> Result<Loaded, KernelError> {
    let prog_name = cmdline.split(' ').next().filter(|s| !s.is_empty()).unwrap_or(cmdline);

    let file = keos::fs::FileSystem::root()
        .open(prog_name)?
        .into_regular_file()
        .ok_or(KernelError::IsDirectory)?;

    let elf = Elf::from_file(&file).ok_or(KernelError::InvalidArgument)?;
    let entry = elf.header.e_entry as usize;

    let mut address_space = AddressSpace::new();
    address_space.activate();
    load_phdrs(&mut address_space, &elf)?;

    let sp = build_stack(&mut address_space, cmdline)?;

    let mut regs = Registers::new();
    *regs.rip() = entry;
    *regs.rsp() = sp.into_usize();

    Ok(Loaded {
        address_space,
        regs,
        exec_file: file,
    })
}

/// Install every `PT_LOAD` segment of `elf` into `space`, per §4.5 step 5.
fn load_phdrs(space: &mut AddressSpace, elf: &Elf) -> Result<(), KernelError> {
    let file_size = elf.file.size();
    for phdr in elf.phdrs().map_err(|_| KernelError::InvalidArgument)? {
        match phdr.type_() {
            PType::Null
            | PType::Note
            | PType::Phdr
            | PType::GnuStack
            | PType::Tls
            | PType::Other(_) => continue,
            PType::Dynamic | PType::Interp | PType::Shlib => {
                return Err(KernelError::InvalidArgument);
            }
            PType::Load => {}
        }

        let (vaddr, memsz, filesz, fileofs) = (
            phdr.p_vaddr as usize,
            phdr.p_memsz as usize,
            phdr.p_filesz as usize,
            phdr.p_offset as usize,
        );
        if memsz == 0 || memsz < filesz {
            return Err(KernelError::InvalidArgument);
        }
        if vaddr & PAGE_MASK != fileofs & PAGE_MASK {
            return Err(KernelError::InvalidArgument);
        }
        match fileofs.checked_add(filesz) {
            Some(end) if end <= file_size => {}
            _ => return Err(KernelError::InvalidArgument),
        }
        if vaddr < 0x1000 {
            return Err(KernelError::InvalidArgument);
        }
        let end = vaddr.checked_add(memsz).ok_or(KernelError::InvalidArgument)?;
        Va::new(end).ok_or(KernelError::InvalidArgument)?;

        let page_va = Va::new(vaddr & !PAGE_MASK).ok_or(KernelError::InvalidArgument)?;
        let span = (vaddr & PAGE_MASK) + memsz;
        space
            .install(page_va, span, phdr.permission())
            .map_err(|_| KernelError::InvalidArgument)?;

        let mut remaining = filesz;
        let mut file_pos = fileofs;
        let mut dst = vaddr;
        let mut buf = [0u8; 0x1000];
        while remaining > 0 {
            let chunk = remaining.min(0x1000 - (dst & PAGE_MASK));
            elf.file.read(file_pos, &mut buf[..chunk])?;
            space.with_page_mut(Va::new(dst).unwrap(), |page, off| {
                page[off..off + chunk].copy_from_slice(&buf[..chunk])
            })?;
            remaining -= chunk;
            file_pos += chunk;
            dst += chunk;
        }
    }
    Ok(())
}

/// Write `bytes` at `*sp - bytes.len()`, update `*sp`, and return the new
/// value. Fails if the write would fall outside the single installed stack
/// page.
fn push_bytes(space: &mut AddressSpace, sp: &mut usize, bytes: &[u8]) -> Result<usize, KernelError> {
    if *sp < STACK_BOTTOM + bytes.len() {
        return Err(KernelError::InvalidArgument);
    }
    *sp -= bytes.len();
    space.with_page_mut(Va::new(*sp).unwrap(), |page, off| {
        page[off..off + bytes.len()].copy_from_slice(bytes)
    })?;
    Ok(*sp)
}

/// Install the single zeroed stack page and lay out `argc`/`argv` on it per
/// §4.5 step 6-7, returning the final stack pointer.
fn build_stack(space: &mut AddressSpace, cmdline: &str) -> Result<Va, KernelError> {
    space
        .install(
            Va::new(STACK_BOTTOM).unwrap(),
            0x1000,
            Permission::USER | Permission::READ | Permission::WRITE,
        )
        .map_err(|_| KernelError::InvalidArgument)?;

    let tokens: Vec<&str> = cmdline.split(' ').collect();
    let mut sp = STACK_TOP;

    let mut arg_addrs = Vec::with_capacity(tokens.len());
    for tok in &tokens {
        let mut bytes = Vec::with_capacity(tok.len() + 1);
        bytes.extend_from_slice(tok.as_bytes());
        bytes.push(0);
        arg_addrs.push(push_bytes(space, &mut sp, &bytes)? as u32);
    }

    let argv_slots = arg_addrs.len() + 1;
    if sp < STACK_BOTTOM + argv_slots * 4 {
        return Err(KernelError::InvalidArgument);
    }
    sp -= argv_slots * 4;
    let argv_base = sp;
    for (i, addr) in arg_addrs.iter().enumerate() {
        let slot = Va::new(argv_base + i * 4).unwrap();
        space.with_page_mut(slot, |page, off| {
            page[off..off + 4].copy_from_slice(&addr.to_ne_bytes())
        })?;
    }
    let null_slot = Va::new(argv_base + arg_addrs.len() * 4).unwrap();
    space.with_page_mut(null_slot, |page, off| {
        page[off..off + 4].copy_from_slice(&0u32.to_ne_bytes())
    })?;

    while (sp - 8) % 16 != 0 {
        if sp <= STACK_BOTTOM {
            return Err(KernelError::InvalidArgument);
        }
        sp -= 1;
    }

    push_bytes(space, &mut sp, &(argv_base as u32).to_ne_bytes())?;
    push_bytes(space, &mut sp, &(tokens.len() as u32).to_ne_bytes())?;
    push_bytes(space, &mut sp, &0u32.to_ne_bytes())?;

    Ok(Va::new(sp).unwrap())
}
