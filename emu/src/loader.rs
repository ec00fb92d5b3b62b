//! ELF image loading.
//!
//! Every section marked ALLOC is copied byte-for-byte into guest memory
//! at its virtual address; the entry point becomes the initial PC.

use anyhow::{bail, Context, Result};
use goblin::elf::section_header::{SHF_ALLOC, SHT_NOBITS};
use goblin::elf::Elf;

/// Copy the ALLOC sections of `data` into `mem` and return the ELF entry
/// address.
pub fn load_elf(data: &[u8], mem: &mut [u8]) -> Result<u64> {
    let elf = Elf::parse(data).context("can't parse ELF image")?;
    for sh in &elf.section_headers {
        if sh.sh_flags & SHF_ALLOC as u64 == 0 {
            continue;
        }
        // NOBITS sections (.bss) occupy no file bytes and fresh guest
        // memory is already zeroed.
        if sh.sh_type == SHT_NOBITS || sh.sh_size == 0 {
            continue;
        }
        let name = elf.shdr_strtab.get_at(sh.sh_name).unwrap_or("?");
        let addr = sh.sh_addr as usize;
        let size = sh.sh_size as usize;
        let off = sh.sh_offset as usize;
        if off.checked_add(size).is_none() || off + size > data.len() {
            bail!("section {name} ({off:#x}+{size:#x}) exceeds the image");
        }
        if addr.checked_add(size).is_none() || addr + size > mem.len() {
            bail!(
                "section {name} at {:#x}+{size:#x} doesn't fit into {} bytes of guest memory",
                sh.sh_addr,
                mem.len()
            );
        }
        mem[addr..addr + size].copy_from_slice(&data[off..off + size]);
    }
    tracing::debug!(entry = elf.entry, sections = elf.section_headers.len(), "ELF image loaded");
    Ok(elf.entry)
}
