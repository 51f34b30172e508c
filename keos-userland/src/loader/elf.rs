//! Parsing for 32-bit, little-endian, i386 ELF executables.
//!
//! The wire format here is ELF32 as produced by a classic i386 toolchain:
//! `Elf32_Ehdr`/`Elf32_Phdr`, all fields 4 bytes wide, program-header entries
//! fixed at 0x20 bytes. This is the one place in the crate where the
//! substrate's native x86_64 widths (`usize`, 8-byte register pushes) don't
//! apply — everything here is explicitly `u32`, matching what the on-disk
//! format and the user stack ABI both expect.
use alloc::vec::Vec;
use core::convert::TryInto;
use keos::{KernelError, fs::RegularFile, mm::page_table::Permission};

/// `Elf32_Ehdr`.
#[derive(Copy, Clone)]
#[repr(C)]
pub struct ELFHeader {
    /// Magic (`\x7fELF`), class (1 = 32-bit), data (1 = little-endian),
    /// version, ABI, ABI version, padding.
    pub magic: [u8; 4],
    pub class: u8,
    pub data: u8,
    pub version: u8,
    pub abi: u8,
    pub abi_version: u8,
    pub pad: [u8; 7],
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u32,
    pub e_phoff: u32,
    pub e_shoff: u32,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

/// The size, in bytes, of one `Elf32_Phdr` entry.
pub const PHDR_ENTRY_SIZE: usize = 0x20;

/// The largest `e_phnum` this loader will accept, per the external
/// interface's closed contract.
pub const MAX_PHNUM: u16 = 1024;

/// A parsed ELF executable, borrowed from the backing file.
pub struct Elf<'a> {
    pub header: ELFHeader,
    pub file: &'a RegularFile,
}

impl<'a, 'b> Elf<'a> {
    /// Parse and validate the ELF header at the start of `file`.
    ///
    /// Validates: magic `\x7fELF`, 32-bit, little-endian, version 1,
    /// executable type, i386 machine, program-header entry size exactly
    /// [`PHDR_ENTRY_SIZE`], and `e_phnum <= `[`MAX_PHNUM`].
    pub fn from_file(file: &'a RegularFile) -> Option<Self> {
        union HeaderUnion {
            _raw: [u8; 4096],
            header: ELFHeader,
        }
        let header = unsafe {
            let mut u = HeaderUnion { _raw: [0; 4096] };
            file.read(0, &mut u._raw).ok()?;
            u.header
        };

        if &header.magic == b"\x7FELF"
            && header.data == 1
            && header.class == 1
            && header.version == 1
            && header.e_type == 2
            && header.e_machine == 3
            && header.e_phentsize as usize == PHDR_ENTRY_SIZE
            && header.e_phnum <= MAX_PHNUM
        {
            Some(Self { header, file })
        } else {
            None
        }
    }

    /// Iterate over this binary's program headers.
    pub fn phdrs(&'b self) -> Result<PhdrIterator<'a, 'b>, KernelError> {
        let base: usize = self.header.e_phoff.try_into().unwrap();
        let size = self.header.e_phnum as usize;
        let mut buffer = alloc::vec![0u8; size * PHDR_ENTRY_SIZE];
        self.file.read(base, buffer.as_mut())?;
        Ok(PhdrIterator {
            cursor: 0,
            buffer,
            elf: self,
        })
    }
}

/// Iterator over an ELF binary's program headers, built by [`Elf::phdrs`].
pub struct PhdrIterator<'a, 'b> {
    cursor: u16,
    elf: &'a Elf<'b>,
    buffer: Vec<u8>,
}

impl core::iter::Iterator for PhdrIterator<'_, '_> {
    type Item = Phdr;
    fn next(&mut self) -> Option<Self::Item> {
        union Reader {
            phdr: Phdr,
            _raw: [u8; PHDR_ENTRY_SIZE],
        }
        let ofs = self.cursor as usize * PHDR_ENTRY_SIZE;
        if ofs < self.buffer.len() {
            unsafe {
                let mut inner = Reader {
                    _raw: [0; PHDR_ENTRY_SIZE],
                };
                inner._raw.copy_from_slice(&self.buffer[ofs..ofs + PHDR_ENTRY_SIZE]);
                self.cursor += 1;
                Some(inner.phdr)
            }
        } else {
            None
        }
    }
}

/// `p_type` values this loader recognizes, classified from the raw on-disk
/// `u32` by [`PType::from_u32`] rather than read directly as a typed enum:
/// an adversarial or corrupt binary can put any 32-bit value in that field,
/// and most of the value space names no ELF segment type at all.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PType {
    Null,
    Load,
    Dynamic,
    Interp,
    Note,
    Shlib,
    Phdr,
    Tls,
    /// `PT_GNU_STACK`, used by Pintos-derived toolchains to mark the stack
    /// segment's executability; carries no loadable content.
    GnuStack,
    /// Any `p_type` this loader does not name, including reserved,
    /// OS-specific, and processor-specific ranges. Segments of this kind are
    /// ignored, not rejected (§4.5).
    Other(u32),
}

impl PType {
    fn from_u32(v: u32) -> Self {
        match v {
            0x0 => PType::Null,
            0x1 => PType::Load,
            0x2 => PType::Dynamic,
            0x3 => PType::Interp,
            0x4 => PType::Note,
            0x5 => PType::Shlib,
            0x6 => PType::Phdr,
            0x7 => PType::Tls,
            0x6474e551 => PType::GnuStack,
            other => PType::Other(other),
        }
    }
}

bitflags::bitflags! {
    /// ELF segment permission bits (`p_flags`).
    pub struct PFlags: u32 {
        const READ = 1 << 2;
        const WRITE = 1 << 1;
        const EXECUTABLE = 1 << 0;
    }
}

/// `Elf32_Phdr`, laid out exactly as the on-disk 32-bit format specifies.
///
/// `p_type` is kept as the raw `u32` here, not [`PType`]: this struct is read
/// straight out of untrusted file bytes through a union (see
/// [`PhdrIterator::next`]), which is only sound when every field accepts
/// every bit pattern. [`PType`] (like any C-style enum with named
/// discriminants) does not; a plain `u32` does. Use [`Phdr::type_`] to
/// classify it.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct Phdr {
    pub p_type: u32,
    pub p_offset: u32,
    pub p_vaddr: u32,
    pub p_paddr: u32,
    pub p_filesz: u32,
    pub p_memsz: u32,
    pub p_flags: PFlags,
    pub p_align: u32,
}

impl Phdr {
    /// Classify this segment's raw `p_type`.
    pub fn type_(&self) -> PType {
        PType::from_u32(self.p_type)
    }

    /// Translate this segment's `p_flags` into page-table [`Permission`]s.
    ///
    /// Every user segment is readable and user-accessible by construction;
    /// `PF_W`/`PF_X` add write/execute on top.
    pub fn permission(&self) -> Permission {
        let mut permission = Permission::USER | Permission::READ;
        if self.p_flags.contains(PFlags::WRITE) {
            permission |= Permission::WRITE;
        }
        if self.p_flags.contains(PFlags::EXECUTABLE) {
            permission |= Permission::EXECUTABLE;
        }
        permission
    }
}
