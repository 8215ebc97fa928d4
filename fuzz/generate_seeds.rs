#!/usr/bin/env -S cargo +nightly -Zscript
---
[dependencies]
zendng = { path = ".." }
---
//! Generate seed corpus files for fuzzing.
//! Run: cargo +nightly -Zscript fuzz/generate_seeds.rs

use std::fs;

use zendng::{
    ByteOrder, DngWriter, SUBFILE_REDUCED_IMAGE, SampleFormat, WriteCompression, WriteImage,
};

fn ramp(n: usize, max: u32, bytes: usize) -> Vec<u8> {
    (0..n as u32)
        .flat_map(|i| {
            let v = (i * 37) % (max + 1);
            match bytes {
                1 => vec![v as u8],
                2 => (v as u16).to_ne_bytes().to_vec(),
                _ => v.to_ne_bytes().to_vec(),
            }
        })
        .collect()
}

fn main() {
    let dir = "fuzz/corpus/fuzz_decode";
    fs::create_dir_all(dir).unwrap();
    let save = |name: &str, writer: DngWriter| {
        fs::write(format!("{dir}/{name}"), writer.write().unwrap()).unwrap();
    };

    // Uncompressed gray, both byte orders
    for (order, tag) in [(ByteOrder::Little, "le"), (ByteOrder::Big, "be")] {
        save(
            &format!("gray16_{tag}.dng"),
            DngWriter::new(order).add_image(WriteImage::new(8, 4, 1, 16, ramp(32, 65535, 2))),
        );
    }

    // Packed 12-bit CFA with DNG color metadata
    save(
        "cfa12_packed.dng",
        DngWriter::new(ByteOrder::Little).add_image(
            WriteImage::new(8, 8, 1, 12, ramp(64, 4095, 2))
                .with_dng_version([1, 4, 0, 0])
                .with_cfa((2, 2), &[0, 1, 1, 2])
                .with_black_level(&[256.0])
                .with_white_level(&[4095])
                .with_as_shot_neutral([0.5, 1.0, 0.7]),
        ),
    );

    // Preview in IFD0, raw in a SubIFD
    save(
        "preview_subifd.dng",
        DngWriter::new(ByteOrder::Little)
            .add_image(
                WriteImage::new(4, 4, 3, 8, ramp(48, 255, 1))
                    .with_subfile_type(SUBFILE_REDUCED_IMAGE),
            )
            .add_image(WriteImage::new(16, 4, 1, 14, ramp(64, 16383, 2))),
    );

    // Deflate tiles with predictors
    save(
        "deflate_tiles_rgb16.dng",
        DngWriter::new(ByteOrder::Big).add_image(
            WriteImage::new(20, 20, 3, 16, ramp(1200, 65535, 2))
                .with_compression(WriteCompression::Deflate)
                .with_predictor(true)
                .with_tiles(16, 16),
        ),
    );
    save(
        "deflate_float.dng",
        DngWriter::new(ByteOrder::Little).add_image(
            WriteImage::new(
                4,
                4,
                1,
                32,
                (0..16).flat_map(|i| (i as f32 / 16.0).to_ne_bytes()).collect::<Vec<u8>>(),
            )
            .with_sample_format(SampleFormat::Float)
            .with_compression(WriteCompression::Deflate)
            .with_predictor(true),
        ),
    );

    // Lossless JPEG: whole image, tiles and CR2 slices
    save(
        "ljpeg_whole.dng",
        DngWriter::new(ByteOrder::Little).add_image(
            WriteImage::new(16, 8, 1, 12, ramp(128, 4095, 2))
                .with_compression(WriteCompression::LosslessJpeg),
        ),
    );
    save(
        "ljpeg_tiles.dng",
        DngWriter::new(ByteOrder::Little).add_image(
            WriteImage::new(32, 16, 1, 14, ramp(512, 16383, 2))
                .with_compression(WriteCompression::LosslessJpeg)
                .with_tiles(16, 16),
        ),
    );
    save(
        "cr2_slices.dng",
        DngWriter::new(ByteOrder::Little).add_image(
            WriteImage::new(20, 4, 1, 12, ramp(80, 4095, 2))
                .with_compression(WriteCompression::LosslessJpeg)
                .with_cr2_slices([2, 8, 4]),
        ),
    );

    // Truncated/malformed seeds for edge coverage
    fs::write(format!("{dir}/empty.bin"), b"").unwrap();
    fs::write(format!("{dir}/header_only.bin"), b"II*\0\x08\0\0\0").unwrap();
    fs::write(format!("{dir}/bigtiff.bin"), b"II+\0\x08\0\0\0").unwrap();
    fs::write(
        format!("{dir}/self_loop.bin"),
        b"II*\0\x08\0\0\0\x01\0\x00\x01\x04\0\x01\0\0\0\x02\0\0\0\x08\0\0\0",
    )
    .unwrap();

    println!("Generated seed corpus in {dir}/");
}
