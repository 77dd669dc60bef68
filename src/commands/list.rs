//! List commands implementation

use crate::bus;
use rnand_core::chip::PROFILES;

/// List all buses compiled into this binary
pub fn list_buses() {
    print!("{}", bus::bus_help());
}

/// List the built-in chip profiles
pub fn list_chips() {
    println!("Supported NAND chips:");
    println!();
    println!(
        "{:<10} {:<16} {:<20} {:>16}",
        "Vendor", "Name", "ID", "Geometry"
    );
    println!("{}", "-".repeat(66));

    for p in PROFILES {
        let id: String = p.id_bytes.iter().map(|b| format!("{:02X}", b)).collect();
        println!(
            "{:<10} {:<16} {:<20} {:>16}",
            p.vendor,
            p.name,
            id,
            p.geometry.to_string()
        );
    }
}

/// List FTDI devices visible over USB
#[cfg(feature = "ftdi")]
pub fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let devices = rnand_ftdi::FtdiNand::list_devices()?;

    if devices.is_empty() {
        println!("No FTDI devices found");
        return Ok(());
    }

    println!("FTDI devices:");
    for dev in &devices {
        println!("  {}", dev);
    }
    Ok(())
}

/// List FTDI devices visible over USB
#[cfg(not(feature = "ftdi"))]
pub fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    Err("FTDI support not compiled in (enable the 'ftdi' feature)".into())
}
