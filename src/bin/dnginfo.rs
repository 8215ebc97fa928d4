//! dnginfo: load a DNG and report its largest image.

#![cfg(feature = "cli")]

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use zendng::{DecodeRequest, DngImage, DngLoader, RawDecoder, Unstoppable, encode_pnm};

#[derive(Parser)]
#[command(name = "dnginfo")]
#[command(about = "Load a DNG/TIFF raw file and describe its largest image", long_about = None)]
struct Args {
    /// DNG, TIFF or CR2 file to load
    file: PathBuf,

    /// Also print the metadata of every image in the file
    #[arg(long)]
    all: bool,

    /// Export the largest image as PGM/PPM/PAM/PFM
    #[arg(long, value_name = "OUT")]
    pnm: Option<PathBuf>,

    /// Fail on the first image that cannot be decoded
    #[arg(long)]
    strict: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn plane_color(c: u8) -> char {
    match c {
        0 => 'R',
        1 => 'G',
        2 => 'B',
        3 => 'C',
        4 => 'M',
        5 => 'Y',
        6 => 'W',
        _ => '?',
    }
}

fn print_matrix(name: &str, m: &zendng::Matrix3) {
    println!("{name} =");
    for row in m {
        println!("  {} , {} , {}", row[0], row[1], row[2]);
    }
}

fn print_image(index: usize, image: &DngImage<'_>) {
    println!("image [{index}]");
    println!("  width = {}", image.width);
    println!("  height = {}", image.height);
    println!("  bits per sample = {}", image.bits_per_sample);
    println!("  bits per sample(original) = {}", image.bits_per_sample_original);
    println!("  samples per pixel = {}", image.samples_per_pixel);
    println!("  sample format = {:?}", image.sample_format);
    println!("  compression = {:?}", image.compression);
    println!("  version = {}", image.version());
    println!("  preview = {}", image.is_preview());
    for s in 0..image.samples_per_pixel.min(4) as usize {
        println!("  white_level[{s}] = {}", image.white_level[s]);
        println!("  black_level[{s}] = {}", image.black_level[s]);
    }
    if let (Some(tw), Some(tl)) = (image.tile_width, image.tile_length) {
        println!("  tile = {tw}x{tl}");
    }
    println!("  cfa_layout = {}", image.cfa_layout);
    let colors: String = image.cfa_plane_color.iter().map(|&c| plane_color(c)).collect();
    println!("  cfa_plane_color = {colors}");
    if let Some(p) = image.cfa_pattern_2x2() {
        let name = |i: u8| {
            image
                .cfa_plane_color
                .get(usize::from(i))
                .map_or('?', |&c| plane_color(c))
        };
        println!(
            "  cfa_pattern[2][2] = {}{} {}{}",
            name(p[0][0]),
            name(p[0][1]),
            name(p[1][0]),
            name(p[1][1])
        );
    }
    if let Some([top, left, bottom, right]) = image.active_area {
        println!("  active_area = {top}, {left}, {bottom}, {right}");
    }
    println!("  calibration_illuminant1 = {:?}", image.calibration_illuminant1);
    println!("  calibration_illuminant2 = {:?}", image.calibration_illuminant2);
    print_matrix("  color_matrix1", &image.color_matrix1);
    print_matrix("  color_matrix2", &image.color_matrix2);
    print_matrix("  forward_matrix1", &image.forward_matrix1);
    print_matrix("  forward_matrix2", &image.forward_matrix2);
    print_matrix("  camera_calibration1", &image.camera_calibration1);
    print_matrix("  camera_calibration2", &image.camera_calibration2);
    if let Some(b) = image.analog_balance {
        println!("  analog_balance = {} , {} , {}", b[0], b[1], b[2]);
    }
    if let Some(n) = image.as_shot_neutral {
        println!("  as_shot_neutral = {} , {} , {}", n[0], n[1], n[2]);
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::builder().filter_level(level).parse_default_env().init();

    let bytes = match fs::read(&args.file) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("cannot read {}: {e}", args.file.display());
            return ExitCode::FAILURE;
        }
    };

    let loader = DngLoader::from_request(DecodeRequest::new(&bytes).strict(args.strict));
    if let Some(e) = loader.error() {
        log::info!("failed to load {}: {e}", args.file.display());
    }

    println!("result {}", loader.is_valid());
    match loader.largest_variant_index() {
        Some(i) => println!("largest_idx {i}"),
        None => println!("largest_idx -1"),
    }
    println!("width {}", loader.width());
    println!("height {}", loader.height());
    println!("channels {}", loader.channel_count());
    println!("bits {}", loader.bit_depth());
    log::debug!("pixel data: {} bytes", loader.pixel_data().len());

    if args.all
        && let Some(output) = loader.output()
    {
        for w in &output.warnings {
            println!("WARN: {w}");
        }
        for (i, image) in output.images.iter().enumerate() {
            print_image(i, image);
        }
    }

    if let (Some(path), Some(image)) = (&args.pnm, loader.largest()) {
        let written = encode_pnm(image, Unstoppable)
            .map_err(|e| e.to_string())
            .and_then(|pnm| fs::write(path, pnm).map_err(|e| e.to_string()));
        if let Err(e) = written {
            eprintln!("cannot export {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}
