//! Drive number resolution: exact matches, natural-number redirection and
//! wildcard CD-ROM calls.

mod common;

use common::{bootable_iso, hook_cdrom, mem, tagged_disk};
use sanboot::{HookRequest, Int13, MemoryBus, NullVector, RegisterFile, SegOff};

#[test]
fn calls_to_other_drives_chain() {
    let mut core = Int13::default();
    let mut bus = mem();
    core.hook(
        HookRequest { drive: 0x81, cylinders: 4, heads: 2, sectors_per_track: 16 },
        Box::new(tagged_disk(128)),
        &mut bus,
        &mut NullVector,
    )
    .unwrap();

    let mut regs = RegisterFile { ax: 0x1500, dx: 0x0080, ..Default::default() };
    assert!(!core.interrupt(&mut regs, &mut bus, None));
    assert_eq!(regs.dl(), 0x80); // untouched
}

#[test]
fn natural_number_access_is_redirected() {
    let mut core = Int13::default();
    let mut bus = mem();
    // The platform already has two fixed disks, so the natural number is
    // 0x82; register the drive as 0x90.
    bus.write_u8(0x475, 2);
    core.hook(
        HookRequest { drive: 0x90, cylinders: 4, heads: 2, sectors_per_track: 16 },
        Box::new(tagged_disk(128)),
        &mut bus,
        &mut NullVector,
    )
    .unwrap();

    let mut regs = RegisterFile { ax: 0x1500, dx: 0x0082, ..Default::default() };
    // Not handled, but DL now names the emulated drive so the chained call
    // comes back to us.
    assert!(!core.interrupt(&mut regs, &mut bus, None));
    assert_eq!(regs.dl(), 0x90);

    assert!(core.interrupt(&mut regs, &mut bus, None));
    assert!(!regs.carry);
    assert_eq!(regs.ah(), 0x03);
}

#[test]
fn natural_numbering_covers_both_numbers_in_drive_count() {
    let mut core = Int13::default();
    let mut bus = mem();
    bus.write_u8(0x475, 1);
    core.hook(
        HookRequest { drive: 0x90, cylinders: 4, heads: 2, sectors_per_track: 16 },
        Box::new(tagged_disk(128)),
        &mut bus,
        &mut NullVector,
    )
    .unwrap();
    // Count must cover drive 0x90, not just the natural 0x81.
    assert_eq!(bus.read_u8(0x475), 0x11);
}

#[test]
fn wildcard_drive_number_reaches_cdrom_status() {
    let mut core = Int13::default();
    let mut bus = mem();
    let drive = hook_cdrom(&mut core, &mut bus, bootable_iso(4, 0));

    let packet = SegOff::new(0x0050, 0x0000);
    let mut regs = RegisterFile {
        ax: 0x4B01,
        dx: 0x007F,
        ds: packet.segment,
        si: packet.offset,
        ..Default::default()
    };
    assert!(core.interrupt(&mut regs, &mut bus, None));
    assert!(!regs.carry);
    assert_eq!(bus.read_u8(packet.linear()), 19);
    assert_eq!(bus.read_u8(packet.linear() + 2), drive);
}

#[test]
fn wildcard_only_applies_to_the_status_command() {
    let mut core = Int13::default();
    let mut bus = mem();
    hook_cdrom(&mut core, &mut bus, bootable_iso(4, 0));

    let mut regs = RegisterFile { ax: 0x1500, dx: 0x00FF, ..Default::default() };
    assert!(!core.interrupt(&mut regs, &mut bus, None));
}

#[test]
fn cdrom_status_on_hard_disk_is_invalid() {
    let mut core = Int13::default();
    let mut bus = mem();
    core.hook(
        HookRequest { drive: 0x80, cylinders: 4, heads: 2, sectors_per_track: 16 },
        Box::new(tagged_disk(128)),
        &mut bus,
        &mut NullVector,
    )
    .unwrap();

    let mut regs = RegisterFile { ax: 0x4B01, dx: 0x0080, ds: 0x0050, ..Default::default() };
    assert!(core.interrupt(&mut regs, &mut bus, None));
    assert!(regs.carry);
    assert_eq!(regs.ah(), 0x01);
}
