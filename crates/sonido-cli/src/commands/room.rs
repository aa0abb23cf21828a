//! Print the predicted T60 (per frequency band) for a shoebox room, with
//! no audio involved — a quick way to sanity-check a room's absorption
//! before rendering through it.

use clap::Args;
use sonido_geometry::{eyring_t60, sabine_t60};

#[derive(Args)]
pub struct RoomArgs {
    /// Room dimensions in metres (width, height, depth)
    #[arg(long, num_args = 3, default_values_t = [6.0, 3.0, 5.0])]
    dimensions: Vec<f32>,

    /// Per-band absorption coefficients, 0-1 (one value per band, at least one)
    #[arg(long, num_args = 1.., default_values_t = [0.1, 0.2, 0.3, 0.3])]
    absorption: Vec<f32>,

    /// Use Eyring's formula instead of Sabine's
    #[arg(long)]
    eyring: bool,
}

pub fn run(args: RoomArgs) -> anyhow::Result<()> {
    let [w, h, d]: [f32; 3] =
        args.dimensions.clone().try_into().map_err(|_| anyhow::anyhow!("--dimensions needs exactly 3 values"))?;
    let volume = w * h * d;
    let surface_area = 2.0 * (w * h + w * d + h * d);

    println!("room {w}x{h}x{d} m  (volume {volume:.1} m^3, surface {surface_area:.1} m^2)");

    for (band, &alpha) in args.absorption.iter().enumerate() {
        let total_absorption = surface_area * alpha;
        let t60 = if args.eyring {
            eyring_t60(volume, surface_area, alpha)
        } else {
            sabine_t60(volume, total_absorption)
        };
        match t60 {
            Some(t60) => println!("  band {band}: absorption={alpha:.2}  T60={t60:.3}s"),
            None => println!("  band {band}: absorption={alpha:.2}  T60=undefined (degenerate room)"),
        }
    }
    Ok(())
}
