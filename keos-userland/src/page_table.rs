//! # Four-Level Page Table of x86_64
//!
//! Each process in this crate gets its own [`PageTable`]: a 4-level x86_64
//! paging structure (PML4 -> PDPT -> PD -> PT) that maps the process's user
//! address space, while sharing the kernel's half of the address space (PML4
//! indices `>= `[`PageTableRoot::KBASE`]) with every other page table in the
//! system.
//!
//! ```text
//! 63          48 47            39 38            30 29            21 20         12 11         0
//! +-------------+----------------+----------------+----------------+-------------+------------+
//! | Sign Extend |    Page-Map    | Page-Directory | Page-directory |  Page-Table |    Page    |
//! |             | Level-4 Offset |    Pointer     |     Offset     |   Offset    |   Offset   |
//! +-------------+----------------+----------------+----------------+-------------+------------+
//!               |                |                |                |             |            |
//!               +------- 9 ------+------- 9 ------+------- 9 ------+----- 9 -----+---- 12 ----+
//!                                           Virtual Address
//! ```
//!
//! Attributes set on intermediate levels (PML4E/PDPE/PDE) are ANDed with the
//! leaf PTE's attributes by the CPU, so intermediate levels are always mapped
//! permissively here (present, writable, user) and the leaf [`Pte`] alone
//! carries the real [`Permission`] of the mapping.
use alloc::boxed::Box;
use core::ops::Deref;
use keos::{
    addressing::{Kva, Pa, Va},
    mm::{Page, page_table::*},
};

/// Decomposition of a page-aligned virtual address into its four page-table
/// indices.
pub struct PtIndices {
    /// The virtual address this breakdown was computed from.
    pub va: Va,
    /// Page Map Level 4 index.
    pub pml4ei: usize,
    /// Page Directory Pointer table index.
    pub pdptei: usize,
    /// Page Directory index.
    pub pdei: usize,
    /// Page Table index.
    pub ptei: usize,
}

impl PtIndices {
    /// Decompose `va` into its four page-table indices.
    ///
    /// # Errors
    /// Returns [`PageTableMappingError::Unaligned`] if `va` is not
    /// page-aligned.
    pub fn from_va(va: Va) -> Result<Self, PageTableMappingError> {
        let addr = va.into_usize();
        if addr & 0xFFF == 0 {
            Ok(Self {
                va,
                pml4ei: (addr >> 39) & 0x1ff,
                pdptei: (addr >> 30) & 0x1ff,
                pdei: (addr >> 21) & 0x1ff,
                ptei: (addr >> 12) & 0x1ff,
            })
        } else {
            Err(PageTableMappingError::Unaligned)
        }
    }
}

/// Convert a [`Permission`] set into the leaf PTE flags that enforce it.
///
/// `P` is always set: this is only called once a mapping is known to exist.
/// `XD` (execute-disable) is set unless [`Permission::EXECUTABLE`] is
/// requested, since the flag's polarity is inverted from ours.
fn pte_flags_of(perm: Permission) -> PteFlags {
    let mut flags = PteFlags::P;
    if perm.contains(Permission::WRITE) {
        flags |= PteFlags::RW;
    }
    if perm.contains(Permission::USER) {
        flags |= PteFlags::US;
    }
    if !perm.contains(Permission::EXECUTABLE) {
        flags |= PteFlags::XD;
    }
    flags
}

/// A process's page table: the root of a 4-level x86_64 paging structure.
pub struct PageTable(pub Box<PageTableRoot>);

impl PageTable {
    /// Create an empty page table that still maps every kernel address.
    pub fn new() -> Self {
        Self(PageTableRoot::new_boxed_with_kernel_addr())
    }

    /// Physical address of this page table's root (PML4).
    pub fn pa(&self) -> Pa {
        Kva::new(self.0.as_ref().as_ptr() as usize)
            .unwrap()
            .into_pa()
    }

    /// Map `va` to the physical page `pg` with the given permissions.
    pub fn map(&mut self, va: Va, pg: Page, perm: Permission) -> Result<(), PageTableMappingError> {
        let pa = pg.into_raw();
        unsafe {
            self.do_map(va, pa, perm).inspect_err(|_| {
                Page::from_pa(pa);
            })
        }
    }

    /// Map `va` to the physical address `pa` with the given permissions,
    /// allocating any intermediate page-table levels that don't exist yet.
    ///
    /// # Safety
    /// Caller must ensure `pa` refers to a valid, owned physical page.
    pub unsafe fn do_map(
        &mut self,
        va: Va,
        pa: Pa,
        perm: Permission,
    ) -> Result<(), PageTableMappingError> {
        let indices = PtIndices::from_va(va)?;

        let pml4e = &mut self.0[indices.pml4ei];
        if pml4e.into_pdp_mut().is_err() {
            let page = Page::new();
            pml4e.set_pa(page.into_raw())?;
            pml4e.set_flags(Pml4eFlags::P | Pml4eFlags::RW | Pml4eFlags::US);
        }

        let pdpe = &mut pml4e.into_pdp_mut()?[indices.pdptei];
        if pdpe.into_pd_mut().is_err() {
            let page = Page::new();
            pdpe.set_pa(page.into_raw())?;
            pdpe.set_flags(PdpeFlags::P | PdpeFlags::RW | PdpeFlags::US);
        }

        let pde = &mut pdpe.into_pd_mut()?[indices.pdei];
        if pde.into_pt_mut().is_err() {
            let page = Page::new();
            pde.set_pa(page.into_raw())?;
            pde.set_flags(PdeFlags::P | PdeFlags::RW | PdeFlags::US);
        }

        let pte = &mut pde.into_pt_mut()?[indices.ptei];
        if pte.flags().contains(PteFlags::P) {
            return Err(PageTableMappingError::Duplicated);
        }
        pte.set_pa(pa)?;
        unsafe {
            pte.set_flags(pte_flags_of(perm));
        }
        Ok(())
    }

    /// Unmap `va`, returning the physical page that was mapped there.
    pub fn unmap(&mut self, va: Va) -> Result<Page, PageTableMappingError> {
        let mut walked = self.walk_mut(va)?;
        let stale = walked.clear().ok_or(PageTableMappingError::NotExist)?;
        Ok(stale.invalidate())
    }

    /// Walk the page table, returning the leaf entry for `va` if mapped.
    pub fn walk(&self, va: Va) -> Result<&Pte, PageTableMappingError> {
        let indices = PtIndices::from_va(va)?;
        let pdp = self.0[indices.pml4ei].into_pdp()?;
        let pd = pdp[indices.pdptei].into_pd()?;
        let pt = pd[indices.pdei].into_pt()?;
        Ok(&pt[indices.ptei])
    }

    /// Walk the page table, returning a mutable handle on the leaf entry for
    /// `va` if mapped.
    pub fn walk_mut(&mut self, va: Va) -> Result<Walked<'_>, PageTableMappingError> {
        let indices = PtIndices::from_va(va)?;
        let pdp = self.0[indices.pml4ei].into_pdp_mut()?;
        let pd = pdp[indices.pdptei].into_pd_mut()?;
        let pt = pd[indices.pdei].into_pt_mut()?;
        Ok(Walked {
            addr: va,
            pte: &mut pt[indices.ptei],
        })
    }

    /// Unmap and free every user mapping, leaving only the PML4 root behind.
    ///
    /// Kernel mappings (`pml4i >= `[`PageTableRoot::KBASE`]) are shared with
    /// every other page table and are never touched here.
    fn clear(&mut self) {
        for pml4ei in 0..PageTableRoot::KBASE {
            let pml4e = &mut self.0[pml4ei];
            if let Ok(pdp) = pml4e.into_pdp_mut() {
                for pdpe in pdp.iter_mut() {
                    if let Ok(pd) = pdpe.into_pd_mut() {
                        for pde in pd.iter_mut() {
                            if let Ok(pt) = pde.into_pt_mut() {
                                for pte in pt.iter_mut() {
                                    if let Some(pa) = unsafe { pte.clear() } {
                                        drop(unsafe { Page::from_pa(pa) });
                                    }
                                }
                            }
                            if let Some(pa) = pde.clear() {
                                drop(unsafe { Page::from_pa(pa) });
                            }
                        }
                    }
                    if let Some(pa) = pdpe.clear() {
                        drop(unsafe { Page::from_pa(pa) });
                    }
                }
            }
            if let Some(pa) = pml4e.clear() {
                drop(unsafe { Page::from_pa(pa) });
            }
        }
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PageTable {
    fn drop(&mut self) {
        assert_ne!(
            keos::mm::page_table::get_current_pt_pa().into_usize(),
            self.pa().into_usize(),
            "Trying to drop an activated page table."
        );
        self.clear()
    }
}

/// A mutable handle on a page-table leaf entry found by [`PageTable::walk_mut`].
pub struct Walked<'a> {
    addr: Va,
    pte: &'a mut Pte,
}

impl Walked<'_> {
    /// Clear the mapping, returning a [`StaleTLBEntry`] to invalidate.
    pub fn clear(&mut self) -> Option<StaleTLBEntry> {
        unsafe {
            self.pte
                .clear()
                .map(|pa| StaleTLBEntry::new(self.addr, Page::from_pa(pa)))
        }
    }

    /// Map this entry to `page` with `flags`, failing if already mapped.
    pub fn set_page(&mut self, page: Page, flags: PteFlags) -> Result<(), PageTableMappingError> {
        if self.pte.flags().contains(PteFlags::P) {
            Err(PageTableMappingError::Duplicated)
        } else {
            unsafe {
                self.pte.set_pa(page.into_raw())?.set_flags(flags);
            }
            Ok(())
        }
    }
}

impl Deref for Walked<'_> {
    type Target = Pte;
    fn deref(&self) -> &Self::Target {
        self.pte
    }
}
