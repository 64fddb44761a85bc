//! Legacy (cylinder/head/sector) command coverage.

mod common;

use common::{hook_hdd, mem, FailingDisk};
use proptest::prelude::*;
use sanboot::{
    HookRequest, Int13, MemoryBus, NullVector, RamDisk, RegisterFile, BLKSIZE, ISO_BLKSIZE,
};

const GEOMETRY: (u32, u32, u32) = (4, 2, 16);

fn chs_regs(command: u8, drive: u8, cylinder: u32, head: u32, sector: u32, count: u8) -> RegisterFile {
    RegisterFile {
        ax: ((command as u16) << 8) | count as u16,
        cx: (((cylinder & 0xFF) as u16) << 8) | (((cylinder >> 2) & 0xC0) as u16) | sector as u16,
        dx: ((head as u16) << 8) | drive as u16,
        es: 0x2000,
        bx: 0x0000,
        ..Default::default()
    }
}

#[test]
fn chs_read_fetches_the_addressed_sector() {
    let mut core = Int13::default();
    let mut bus = mem();
    let drive = hook_hdd(&mut core, &mut bus, 128, GEOMETRY);

    // Cylinder 2, head 1, sector 5 with 2/16 heads/sectors: LBA 84.
    let mut regs = chs_regs(0x02, drive, 2, 1, 5, 1);
    assert!(core.interrupt(&mut regs, &mut bus, None));
    assert!(!regs.carry);
    assert_eq!(regs.ah(), 0);
    assert_eq!(bus.read_u64(0x20000), 84);
}

#[test]
fn chs_write_stores_guest_memory() {
    let mut core = Int13::default();
    let mut bus = mem();
    let drive = hook_hdd(&mut core, &mut bus, 128, GEOMETRY);

    bus.write_physical(0x20000, &[0x5A; BLKSIZE]);
    let mut regs = chs_regs(0x03, drive, 0, 0, 2, 1);
    assert!(core.interrupt(&mut regs, &mut bus, None));
    assert!(!regs.carry);

    let mut back = chs_regs(0x02, drive, 0, 0, 2, 1);
    back.es = 0x2100;
    assert!(core.interrupt(&mut back, &mut bus, None));
    let mut sector = vec![0u8; BLKSIZE];
    bus.read_physical(0x21000, &mut sector);
    assert_eq!(sector, vec![0x5A; BLKSIZE]);
}

#[test]
fn chs_address_out_of_range_is_invalid() {
    let mut core = Int13::default();
    let mut bus = mem();
    let drive = hook_hdd(&mut core, &mut bus, 128, GEOMETRY);

    for (cylinder, head, sector) in [(4, 0, 1), (0, 2, 1), (0, 0, 0), (0, 0, 17)] {
        let mut regs = chs_regs(0x02, drive, cylinder, head, sector, 1);
        assert!(core.interrupt(&mut regs, &mut bus, None));
        assert!(regs.carry);
        assert_eq!(regs.ah(), 0x01);
    }
}

#[test]
fn chs_commands_reject_non_512_byte_media() {
    let mut core = Int13::default();
    let mut bus = mem();
    let iso = RamDisk::zeroed(64, ISO_BLKSIZE);
    let drive = core
        .hook(HookRequest::new(0xE0), Box::new(iso), &mut bus, &mut NullVector)
        .unwrap();

    for command in [0x02, 0x03, 0x08] {
        let mut regs = chs_regs(command, drive, 0, 0, 1, 1);
        assert!(core.interrupt(&mut regs, &mut bus, None));
        assert!(regs.carry);
        assert_eq!(regs.ah(), 0x01);
    }
}

#[test]
fn get_parameters_reports_maxima_and_drive_count() {
    let mut core = Int13::default();
    let mut bus = mem();
    let drive = hook_hdd(&mut core, &mut bus, 128, GEOMETRY);

    let mut regs = chs_regs(0x08, drive, 0, 0, 0, 0);
    assert!(core.interrupt(&mut regs, &mut bus, None));
    assert!(!regs.carry);
    assert_eq!(regs.ch(), 3); // max cylinder
    assert_eq!(regs.cl() & 0x3F, 16); // sector count, not max index
    assert_eq!(regs.dh(), 1); // max head
    assert_eq!(regs.dl(), 1); // one fixed disk
}

#[test]
fn get_parameters_for_floppy_points_at_parameter_table() {
    let mut core = Int13::default();
    let mut bus = mem();
    let fdd = RamDisk::zeroed(2880, BLKSIZE);
    let drive = core
        .hook(HookRequest::new(0x00), Box::new(fdd), &mut bus, &mut NullVector)
        .unwrap();

    let mut regs = chs_regs(0x08, drive, 0, 0, 0, 0);
    assert!(core.interrupt(&mut regs, &mut bus, None));
    assert!(!regs.carry);
    assert_eq!(regs.bl(), 0x04); // 1.44M type
    assert_eq!(regs.dl(), 1); // one floppy
    // The table the returned pointer names has 512-byte sectors (code 2).
    let table = sanboot::SegOff::new(regs.es, regs.di);
    assert_eq!(bus.read_u8(table.linear() + 3), 0x02);
    assert_eq!(bus.read_u8(table.linear() + 4), 48);
}

#[test]
fn get_disk_type_reports_capacity_for_hard_disks() {
    let mut core = Int13::default();
    let mut bus = mem();
    let drive = hook_hdd(&mut core, &mut bus, 0x0002_0005, (1024, 255, 63));

    let mut regs = chs_regs(0x15, drive, 0, 0, 0, 0);
    assert!(core.interrupt(&mut regs, &mut bus, None));
    assert!(!regs.carry);
    assert_eq!(regs.ah(), 0x03);
    assert_eq!(regs.cx, 0x0002);
    assert_eq!(regs.dx, 0x0005);
}

#[test]
fn get_disk_type_for_floppy() {
    let mut core = Int13::default();
    let mut bus = mem();
    let fdd = RamDisk::zeroed(2880, BLKSIZE);
    let drive = core
        .hook(HookRequest::new(0x00), Box::new(fdd), &mut bus, &mut NullVector)
        .unwrap();

    let mut regs = chs_regs(0x15, drive, 0, 0, 0, 0);
    assert!(core.interrupt(&mut regs, &mut bus, None));
    assert_eq!(regs.ah(), 0x01);
}

#[test]
fn last_status_replays_previous_outcome() {
    let mut core = Int13::default();
    let mut bus = mem();
    let drive = hook_hdd(&mut core, &mut bus, 128, GEOMETRY);

    // Fail one command, then ask for last status.
    let mut bad = chs_regs(0x02, drive, 9, 0, 1, 1);
    assert!(core.interrupt(&mut bad, &mut bus, None));
    assert!(bad.carry);

    let mut regs = chs_regs(0x01, drive, 0, 0, 0, 0);
    assert!(core.interrupt(&mut regs, &mut bus, None));
    assert!(regs.carry);
    assert_eq!(regs.ah(), 0x01);
}

#[test]
fn reset_maps_device_failure() {
    let mut core = Int13::default();
    let mut bus = mem();
    let drive = core
        .hook(
            HookRequest { drive: 0x80, cylinders: 4, heads: 2, sectors_per_track: 16 },
            Box::new(FailingDisk { blocks: 128 }),
            &mut bus,
            &mut NullVector,
        )
        .unwrap();

    let mut regs = chs_regs(0x00, drive, 0, 0, 0, 0);
    assert!(core.interrupt(&mut regs, &mut bus, None));
    assert!(regs.carry);
    assert_eq!(regs.ah(), 0x05);
}

#[test]
fn io_failure_reports_read_error() {
    let mut core = Int13::default();
    let mut bus = mem();
    let drive = core
        .hook(
            HookRequest { drive: 0x80, cylinders: 4, heads: 2, sectors_per_track: 16 },
            Box::new(FailingDisk { blocks: 128 }),
            &mut bus,
            &mut NullVector,
        )
        .unwrap();

    let mut regs = chs_regs(0x02, drive, 1, 0, 1, 1);
    assert!(core.interrupt(&mut regs, &mut bus, None));
    assert!(regs.carry);
    assert_eq!(regs.ah(), 0x04);
}

#[test]
fn unrecognised_command_is_invalid() {
    let mut core = Int13::default();
    let mut bus = mem();
    let drive = hook_hdd(&mut core, &mut bus, 128, GEOMETRY);

    let mut regs = chs_regs(0x76, drive, 0, 0, 0, 0);
    assert!(core.interrupt(&mut regs, &mut bus, None));
    assert!(regs.carry);
    assert_eq!(regs.ah(), 0x01);
}

proptest! {
    /// Every in-range CHS address maps to the expected flat block.
    #[test]
    fn chs_to_lba_mapping(cylinder in 0u32..4, head in 0u32..2, sector in 1u32..=16) {
        let mut core = Int13::default();
        let mut bus = mem();
        let drive = hook_hdd(&mut core, &mut bus, 128, GEOMETRY);

        let mut regs = chs_regs(0x02, drive, cylinder, head, sector, 1);
        prop_assert!(core.interrupt(&mut regs, &mut bus, None));
        prop_assert!(!regs.carry);
        let expected = ((cylinder * 2 + head) * 16 + sector - 1) as u64;
        prop_assert_eq!(bus.read_u64(0x20000), expected);
    }
}
