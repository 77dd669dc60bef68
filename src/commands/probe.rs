//! Probe command implementation

use rnand_core::bus::NandBus;
use rnand_core::ident::Identification;
use rnand_core::onfi::OnfiParameters;
use rnand_core::protocol::NandDevice;

/// Print the identification record of an identified device
pub fn run_probe<B: NandBus>(device: &mut NandDevice<B>) -> Result<(), Box<dyn std::error::Error>> {
    let ident = device
        .identification()
        .cloned()
        .ok_or(rnand_core::Error::NotIdentified)?;
    let geometry = *device.geometry();

    print_identification(&ident);

    println!();
    println!("Geometry ({}):", ident.profile.name);
    println!(
        "  Page:   {} + {} bytes spare",
        geometry.page_size, geometry.oob_size
    );
    println!(
        "  Block:  {} pages ({} KiB)",
        geometry.pages_per_block,
        geometry.block_size() / 1024
    );
    println!(
        "  Device: {} blocks, {} pages, {} MiB ({} MiB raw)",
        geometry.block_count,
        geometry.page_count(),
        geometry.total_size() / (1024 * 1024),
        geometry.raw_total_size() / (1024 * 1024)
    );
    println!("  Address cycles: {}", geometry.addr_cycles);

    let status = device.read_status()?;
    println!();
    println!("Status: 0x{:02X} {:?}", status.bits(), status);

    Ok(())
}

fn print_identification(ident: &Identification) {
    println!("Found NAND device:");
    println!("  Vendor: {} ({})", ident.profile.vendor, ident.manufacturer());
    println!("  Name:   {}", ident.profile.name);
    println!(
        "  ID:     {} ({} bytes)",
        ident.id_string(),
        ident.id_length()
    );
    println!("  Raw ID: {:02X?}", ident.id_bytes);
    println!(
        "  Unique ID fingerprint: {}",
        hex(&ident.unique_id.fingerprint())
    );

    println!();
    println!("Features:");
    for f in &ident.features {
        println!(
            "  [0x{:02X}] {:32} {:02X?}",
            f.address, f.name, f.params
        );
    }

    println!();
    match &ident.onfi {
        Some(onfi) => print_onfi(onfi),
        None => println!("ONFI: not supported"),
    }
}

fn print_onfi(onfi: &OnfiParameters) {
    let crc = if onfi.crc_valid() {
        "valid".to_string()
    } else {
        format!("MISMATCH, computed 0x{:04X}", onfi.computed_crc)
    };

    println!("ONFI parameter page:");
    println!("  Revision:      0x{:04X}", onfi.revision);
    println!("  Manufacturer:  {} (JEDEC 0x{:02X})", onfi.manufacturer, onfi.jedec_id);
    println!("  Model:         {}", onfi.model);
    println!("  Date code:     0x{:04X}", onfi.date_code);
    println!("  Features:      0x{:04X}", onfi.features);
    println!("  Optional cmds: 0x{:04X}", onfi.optional_commands);
    println!(
        "  Organisation:  {} + {} bytes/page, {} pages/block, {} blocks/LUN, {} LUN(s)",
        onfi.page_size,
        onfi.spare_size,
        onfi.pages_per_block,
        onfi.blocks_per_lun,
        onfi.lun_count
    );
    println!(
        "  Address:       {} row + {} column cycles",
        onfi.row_addr_cycles, onfi.column_addr_cycles
    );
    println!("  Bits per cell: {}", onfi.bits_per_cell);
    println!("  Bad blocks:    {} max per LUN", onfi.max_bad_blocks_per_lun);
    println!("  Endurance:     0x{:04X}", onfi.block_endurance);
    println!("  ECC bits:      {}", onfi.ecc_bits);
    println!("  Timing modes:  0x{:04X}", onfi.timing_modes);
    println!(
        "  tPROG {} us, tBERS {} us, tR {} us, tCCS {} ns",
        onfi.t_prog_us, onfi.t_bers_us, onfi.t_r_us, onfi.t_ccs_ns
    );
    println!("  Vendor rev:    0x{:04X}", onfi.vendor_revision);
    println!("  CRC:           0x{:04X} ({})", onfi.crc, crc);

    let hint = onfi.geometry_hint();
    println!("  Geometry:      {} ({} address cycles)", hint, hint.addr_cycles);
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}
