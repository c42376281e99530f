// SPDX-License-Identifier: MIT OR Apache-2.0

use std::path::PathBuf;
use std::time::Instant;
use argh::FromArgs;

use nd2_parser::*;

/** nd2csv v0.1.0

Extract image frames from Nikon ND2 files to csv
*/
#[derive(FromArgs)]
struct Opts {
    /// input .nd2 file
    #[argh(positional)]
    input: PathBuf,

    /// output csv file
    #[argh(positional)]
    output: PathBuf,

    /// ignore frames numbered at or above this value
    #[argh(option)]
    max_frames: Option<usize>,

    /// resume the chunk map scan past each parsed record
    #[argh(switch)]
    skip_records: bool,

    /// require every frame to hold height * width samples
    #[argh(switch)]
    validate: bool,

    /// print a json summary of the container
    #[argh(switch, short = 'd')]
    dump: bool,
}

impl Opts {
    fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            max_frames: self.max_frames,
            scan_resume: if self.skip_records { ScanResume::PastRecord } else { ScanResume::NextByte },
            validate_pixel_count: self.validate,
        }
    }
}

const HEADER: [&str; 5] = ["frame", "timestamp", "width", "height", "pixels"];

// One record per frame: frame, timestamp, width, height, then every sample
fn frame_record(index: usize, frame: &Frame, dims: Option<ImageDimensions>) -> csv::StringRecord {
    let mut record = csv::StringRecord::with_capacity(frame.pixels.len() * 6, frame.pixels.len() + 4);
    record.push_field(&index.to_string());
    record.push_field(&frame.timestamp.to_string());
    record.push_field(&dims.map(|x| x.width.to_string()).unwrap_or_default());
    record.push_field(&dims.map(|x| x.height.to_string()).unwrap_or_default());
    for p in &frame.pixels {
        record.push_field(&p.to_string());
    }
    record
}

fn run(opts: &Opts) -> std::result::Result<(), Box<dyn std::error::Error>> {
    if !Nd2File::detect(&opts.input) {
        return Err(Error::UnsupportedExtension(filesystem::get_filename(&opts.input)).into());
    }

    let mut input = Nd2File::open(&opts.input, opts.parse_options())?;
    let dims = input.dimensions().map_err(|e| log::warn!("Image dimensions unavailable: {e}")).ok();

    let indices: Vec<usize> = input.frame_index()?.iter().map(|(i, _)| i).collect();
    println!("Frames: {}, dimensions: {}", indices.len(), dims.map(|x| format!("{}x{}", x.width, x.height)).unwrap_or_else(|| "unknown".into()));

    if opts.dump {
        let trailer = *input.trailer();
        let frames = input.frame_index()?.clone();
        let summary = serde_json::json!({
            "file": filesystem::get_filename(&opts.input),
            "trailer": trailer,
            "dimensions": dims,
            "options": input.options(),
            "frames": frames,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(&opts.output)?;
    writer.write_record(HEADER)?;
    for index in indices {
        let frame = input.read_frame(index)?;
        writer.write_record(&frame_record(index, &frame, dims))?;
    }
    writer.flush()?;

    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts: Opts = argh::from_env();
    let _time = Instant::now();

    if let Err(e) = run(&opts) {
        log::error!("{}: {e}", opts.input.display());
        std::process::exit(1);
    }
    println!("Done in {:.3} ms", _time.elapsed().as_micros() as f64 / 1000.0);
}
