//! # Per-process address space.
//!
//! Each process owns one [`AddressSpace`]: a [`PageTable`] plus a record of
//! the regions installed into it. Installation is always eager — every page
//! named in a [`AddressSpace::install`] call is allocated and mapped on the
//! spot — there is no lazy/demand-paged policy to choose between, since
//! nothing in this crate maps memory outside of the loader (`PT_LOAD`
//! segments, the single stack page) and pthread-style additional stacks.
//!
//! This plays the role the teacher's `MmStruct<P: Pager>` plus its `Pager`
//! trait and `EagerPager` implementation played together: the genericity over
//! paging policy existed there to support a later, demand-paged project. With
//! no `mmap`/`munmap` system call and a single paging policy, that axis of
//! variation is collapsed into one concrete type here.
use crate::page_table::PageTable;
use alloc::collections::BTreeMap;
use core::ops::Range;
use keos::{
    KernelError,
    addressing::{PAGE_MASK, Va},
    mm::{Page, PageRef, page_table::Permission},
};

/// A single installed mapping, recorded so [`AddressSpace::access_ok`] can
/// answer permission questions without walking the page table.
struct Mapping {
    perm: Permission,
}

/// A process's virtual address space: a page table plus the bookkeeping
/// needed to validate and resolve user pointers against it.
pub struct AddressSpace {
    pub page_table: PageTable,
    mappings: BTreeMap<Va, Mapping>,
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressSpace {
    /// Create an empty address space (kernel mappings only).
    pub fn new() -> Self {
        Self {
            page_table: PageTable::new(),
            mappings: BTreeMap::new(),
        }
    }

    /// Physical address of the root page table, for CR3.
    pub fn pa(&self) -> keos::addressing::Pa {
        self.page_table.pa()
    }

    /// Switch the CPU to this address space.
    pub fn activate(&self) {
        keos::mm::page_table::load_pt(self.pa());
    }

    /// Install `size` bytes of zero-filled, freshly allocated pages starting
    /// at the page-aligned address `addr`, with permission `perm`.
    ///
    /// Used for `PT_LOAD` segments (after the file content has been copied
    /// in) and for stack pages.
    pub fn install(&mut self, addr: Va, size: usize, perm: Permission) -> Result<(), KernelError> {
        if addr.into_usize() & PAGE_MASK != 0 {
            return Err(KernelError::InvalidArgument);
        }
        let npages = size.div_ceil(0x1000);
        for i in 0..npages {
            let va = addr + i * 0x1000;
            if self.mappings.contains_key(&va) {
                return Err(KernelError::InvalidArgument);
            }
            self.page_table
                .map(va, Page::new(), perm)
                .map_err(|_| KernelError::InvalidArgument)?;
            self.mappings.insert(va, Mapping { perm });
        }
        Ok(())
    }

    /// Find the page mapped at `va`'s containing page and run `f` with a
    /// mutable view of its bytes and `va`'s offset within that page.
    pub fn with_page_mut<R>(
        &mut self,
        va: Va,
        f: impl FnOnce(&mut [u8], usize) -> R,
    ) -> Result<R, KernelError> {
        let page_va = Va::new(va.into_usize() & !PAGE_MASK).unwrap();
        let pte = self
            .page_table
            .walk(page_va)
            .map_err(|_| KernelError::BadAddress)?;
        if !pte.flags().contains(keos::mm::page_table::PteFlags::P) {
            return Err(KernelError::BadAddress);
        }
        let mut page_ref = unsafe { PageRef::from_pa(pte.pa()) };
        Ok(f(page_ref.inner_mut(), va.into_usize() & PAGE_MASK))
    }

    /// Unmap and free the single page at `addr`, installed earlier by
    /// [`Self::install`]. Used to free a pthread's stack page at per-thread
    /// exit (§4.7.4 step 1).
    pub fn free_page(&mut self, addr: Va) -> Result<(), KernelError> {
        self.mappings
            .remove(&addr)
            .ok_or(KernelError::InvalidArgument)?;
        self.page_table
            .unmap(addr)
            .map_err(|_| KernelError::InvalidArgument)?;
        Ok(())
    }

    /// Whether every byte in `addr` may be accessed with the given intent.
    ///
    /// This backs [`keos::task::Task::access_ok`] and, through it, every
    /// `UserPtr*`/`UserU8Slice*`/`UserCString` validation in
    /// [`crate::uaccess`].
    pub fn access_ok(&self, addr: Range<Va>, is_write: bool) -> bool {
        if addr.start.into_usize() == 0 || addr.end <= addr.start {
            return false;
        }
        let first = Va::new(addr.start.into_usize() & !PAGE_MASK).unwrap();
        let last = Va::new((addr.end.into_usize() - 1) & !PAGE_MASK).unwrap();
        let mut va = first;
        loop {
            match self.mappings.get(&va) {
                Some(m) if !is_write || m.perm.contains(Permission::WRITE) => {}
                _ => return false,
            }
            if va == last {
                return true;
            }
            va = va + 0x1000;
        }
    }
}
