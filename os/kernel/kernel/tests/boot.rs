//! Boot sequence and the memory-manager surface of the kernel context.

mod common;

use common::boot;
use kernel::{BootError, Kernel, KernelConfig};
use kernel_alloc::{BitmapFrameAlloc, HeapError};
use kernel_info::memory::{PAGE_TABLE_POOL_BYTES, RESERVED_LOW_MEMORY};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_proc::{NoContextSwitch, Pid, ProcessState};
use kernel_vmem::{PageEntryBits, PagingControl};

#[derive(Default)]
struct RecordingPaging {
    loaded: Option<PhysicalAddress>,
    enabled: bool,
}

impl PagingControl for RecordingPaging {
    unsafe fn load_directory(&mut self, root: PhysicalAddress) {
        self.loaded = Some(root);
    }

    unsafe fn enable_paging(&mut self) {
        assert!(self.loaded.is_some(), "paging enabled before a directory was loaded");
        self.enabled = true;
    }
}

#[test]
fn boot_builds_identity_and_kernel_maps() {
    let k = boot(KernelConfig::default(), NoContextSwitch);

    for addr in [0x1000, 0x000b_8000, 0x0010_0000, 0x0020_0040, 0x003f_f000] {
        assert_eq!(
            k.translate(VirtualAddress::new(addr)),
            Some(PhysicalAddress::new(addr)),
            "{addr:#x}"
        );
    }
    assert_eq!(k.translate(VirtualAddress::new(0)), Some(PhysicalAddress::new(0)));
    assert_eq!(k.translate(VirtualAddress::new(0x0040_0000)), None);
    assert!(!k.paging_enabled());

    let tables: Vec<_> = k.page_tables().collect();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].base, VirtualAddress::new(0));
    assert_eq!(tables[0].present_pages, 1024);
}

#[test]
fn reserved_frames_are_never_handed_out() {
    let k = boot(KernelConfig::default(), NoContextSwitch);
    let frames = k.frames();

    assert!(frames.is_allocated(PhysicalAddress::zero().frame()));
    assert!(frames.is_allocated(PhysicalAddress::new(RESERVED_LOW_MEMORY - 0x1000).frame()));
    // Directory and the low page table.
    assert_eq!(k.page_directory().base(), PhysicalAddress::new(RESERVED_LOW_MEMORY));
    assert!(frames.is_allocated(PhysicalAddress::new(RESERVED_LOW_MEMORY + 0x1000).frame()));
    assert!(!frames.is_allocated(PhysicalAddress::new(RESERVED_LOW_MEMORY + 0x2000).frame()));

    let report = k.memory_report();
    assert_eq!(report.total_frames, BitmapFrameAlloc::<2048>::FRAMES);
    assert_eq!(report.used_frames(), RESERVED_LOW_MEMORY / 0x1000 + 2);
    assert_eq!(report.frame_stats.allocations, 2);
    assert_eq!(report.page_tables, 1);
}

#[test]
fn idle_is_running_after_boot() {
    let k = boot(KernelConfig::default(), NoContextSwitch);
    assert_eq!(k.current(), Pid::IDLE);

    let listed: Vec<_> = k.scheduler().list(64).map(|p| (p.pid(), p.state())).collect();
    assert_eq!(listed, vec![(Pid::IDLE, ProcessState::Running)]);
}

#[test]
fn heap_window_comes_from_config() {
    let k = boot(KernelConfig::default(), NoContextSwitch);
    let report = k.memory_report();
    assert_eq!(report.heap_start, VirtualAddress::new(0x0020_0000));
    assert_eq!(report.heap_size, 0x0010_0000);
    assert_eq!(report.heap_used, 0);
    assert_eq!(report.heap_blocks, 1);
}

#[test]
fn tiny_heap_fails_boot() {
    let config = KernelConfig {
        heap_size: 8,
        ..KernelConfig::default()
    };
    let err = Kernel::boot(config, common::pool(), NoContextSwitch).err();
    assert_eq!(err, Some(BootError::Heap(HeapError::WindowTooSmall(8))));
}

#[test]
fn paging_activation_is_explicit() {
    let mut k = boot(KernelConfig::default(), NoContextSwitch);
    let pool = VirtualAddress::new(RESERVED_LOW_MEMORY);
    assert_eq!(k.translate(pool), None);

    let mut paging = RecordingPaging::default();
    unsafe { k.enable_paging(&mut paging) }.unwrap();

    assert!(paging.enabled);
    assert_eq!(paging.loaded, Some(k.page_directory().base()));
    assert!(k.paging_enabled());
    assert_eq!(k.translate(pool), Some(PhysicalAddress::new(RESERVED_LOW_MEMORY)));
    let last = VirtualAddress::new(RESERVED_LOW_MEMORY + PAGE_TABLE_POOL_BYTES - 0x1000);
    assert_eq!(k.translate(last), Some(PhysicalAddress::new(last.as_u32())));
    assert_eq!(k.page_tables().count(), 2);
}

#[test]
fn map_and_unmap_through_the_kernel() {
    let mut k = boot(KernelConfig::default(), NoContextSwitch);
    let va = VirtualAddress::new(0x0040_0000);
    let pa = PhysicalAddress::new(0x0080_0000);

    k.map(va, pa, PageEntryBits::new_kernel_rw()).unwrap();
    assert_eq!(k.translate(va + 0x123), Some(pa + 0x123));

    k.unmap(va).unwrap();
    assert_eq!(k.translate(va), None);
    assert!(k.unmap(va).is_err());
}

#[test]
fn kmalloc_and_kfree_round_trip() {
    let mut k = boot(KernelConfig::default(), NoContextSwitch);
    let a = k.kmalloc(100).unwrap();
    let b = k.kmalloc(200).unwrap();
    assert!(b > a);
    assert_eq!(k.kfree(a).unwrap(), 100);
    assert_eq!(k.kfree(b).unwrap(), 200);
    assert_eq!(k.memory_report().heap_blocks, 1);
    assert_eq!(k.kmalloc(0), Err(HeapError::ZeroSize));
}
