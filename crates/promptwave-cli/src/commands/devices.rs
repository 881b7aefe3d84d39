//! Audio output device listing.

use clap::Args;
use promptwave_io::list_output_devices;

#[derive(Args)]
pub struct DevicesArgs {
    /// Only show the default output
    #[arg(long)]
    default: bool,
}

pub fn run(args: DevicesArgs) -> anyhow::Result<()> {
    let devices = list_output_devices()?;
    let shown: Vec<_> = devices
        .iter()
        .filter(|d| !args.default || d.is_default)
        .collect();

    if shown.is_empty() {
        println!("No output devices found.");
        return Ok(());
    }

    println!("Output Devices");
    println!("==============\n");
    for (idx, device) in shown.iter().enumerate() {
        let marker = if device.is_default { " (default)" } else { "" };
        println!(
            "  [{}] {} ({} Hz, {} ch){}",
            idx, device.name, device.default_sample_rate, device.channels, marker
        );
    }
    println!();
    println!("Tip: pass a partial name to live with --device:");
    println!("  promptwave live --device \"USB\" -p \"Minimal techno\"");

    Ok(())
}
