//! Offline render: push a mono WAV file through the engine's ordinary
//! `submit_audio`/`get_output` pair, block by block, and write the
//! resulting stereo tail to a WAV file. Exercises the engine exactly the
//! way a real-time host callback would, just off a file instead of a
//! device.

use std::path::PathBuf;

use clap::Args;
use sonido_engine::{Context, EngineConfig};

use super::scene::build_shoebox;

#[derive(Args)]
pub struct RenderArgs {
    /// Input mono WAV file
    input: PathBuf,

    /// Output stereo WAV file
    output: PathBuf,

    /// Room dimensions in metres (width, height, depth)
    #[arg(long, num_args = 3, default_values_t = [6.0, 3.0, 5.0])]
    room: Vec<f32>,

    /// Uniform per-band absorption coefficient, 0-1
    #[arg(long, default_value_t = 0.3)]
    absorption: f32,

    /// Extra seconds of silence appended at the end to let the reverb tail ring out
    #[arg(long, default_value_t = 2.0)]
    tail_seconds: f32,

    /// Processing block size
    #[arg(long, default_value_t = 512)]
    block_size: usize,
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let mut reader = hound::WavReader::open(&args.input)?;
    let spec = reader.spec();
    let sample_rate = spec.sample_rate as f32;

    let input: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader.samples::<i32>().map(|s| s.map(|v| v as f32 / max)).collect::<Result<_, _>>()?
        }
    };
    tracing::debug!(samples = input.len(), sample_rate, "read input");

    let room_dims: [f32; 3] = args.room.clone().try_into().map_err(|_| anyhow::anyhow!("--room needs exactly 3 values"))?;
    let tail_samples = (args.tail_seconds * sample_rate) as usize;

    let config = EngineConfig { sample_rate, block_size: args.block_size, ..EngineConfig::default() };
    let mut ctx = Context::new(config)?;
    let source = build_shoebox(&mut ctx, room_dims, [args.absorption; 4]);

    // Let the IEM thread publish an initial path set before we start feeding audio.
    std::thread::sleep(std::time::Duration::from_millis(50));

    let total_samples = input.len() + tail_samples;
    let mut stereo_out = Vec::with_capacity(total_samples);
    let mut block = vec![(0.0f32, 0.0f32); args.block_size];

    let mut offset = 0;
    while offset < total_samples {
        let this_block = args.block_size.min(total_samples - offset);
        let submit_end = (offset + this_block).min(input.len());
        if offset < submit_end {
            ctx.submit_audio(source, &input[offset..submit_end]);
        }

        ctx.get_output(&mut block[..this_block]);
        stereo_out.extend_from_slice(&block[..this_block]);
        offset += this_block;
    }

    let out_spec =
        hound::WavSpec { channels: 2, sample_rate: spec.sample_rate, bits_per_sample: 32, sample_format: hound::SampleFormat::Float };
    let mut writer = hound::WavWriter::create(&args.output, out_spec)?;
    for (l, r) in &stereo_out {
        writer.write_sample(*l)?;
        writer.write_sample(*r)?;
    }
    writer.finalize()?;

    println!("wrote {} stereo samples to {}", stereo_out.len(), args.output.display());
    Ok(())
}
