//! Write images with [`DngWriter`] and read them back.

mod common;

use common::*;
use enough::Unstoppable;
use zendng::*;

const ORDERS: [ByteOrder; 2] = [ByteOrder::Little, ByteOrder::Big];

#[test]
fn uncompressed_every_depth() {
    for order in ORDERS {
        for bits in [1, 2, 4, 8, 10, 12, 14, 16, 20, 24, 32] {
            let samples = gradient(13, 5, 1, bits);
            let file = write_one(order, WriteImage::new(13, 5, 1, bits, samples.clone()));
            let output = decode(&file, Unstoppable).unwrap();
            let image = &output.images[0];
            assert_eq!(image.pixels(), &samples[..], "{order:?} {bits}-bit");
            assert_eq!(image.bits_per_sample_original, bits);
            assert_eq!(image.bits_per_sample, image.sample_type().bits());
            assert_eq!(output.byte_order, order);
            assert!(output.warnings.is_empty(), "{:?}", output.warnings);
        }
    }
}

#[test]
fn uncompressed_rgb_strips() {
    for order in ORDERS {
        let samples = gradient(10, 9, 3, 16);
        let file = write_one(
            order,
            WriteImage::new(10, 9, 3, 16, samples.clone()).with_rows_per_strip(4),
        );
        let output = decode(&file, Unstoppable).unwrap();
        let image = &output.images[0];
        assert_eq!(image.strip_offsets.len(), 3);
        assert_eq!(image.rows_per_strip, 4);
        assert_eq!(image.layout(), PixelLayout::RGB16);
        assert_eq!(image.pixels(), &samples[..]);
    }
}

#[test]
fn contiguous_8bit_strips_are_borrowed() {
    let samples = gradient(8, 6, 1, 8);
    let file = write_one(
        ByteOrder::Little,
        WriteImage::new(8, 6, 1, 8, samples.clone()).with_rows_per_strip(2),
    );
    let output = decode(&file, Unstoppable).unwrap();
    assert!(output.images[0].is_borrowed());
    assert_eq!(output.images[0].pixels(), &samples[..]);

    let owned = output.into_owned();
    assert!(!owned.images[0].is_borrowed());
    assert_eq!(owned.images[0].pixels(), &samples[..]);
}

#[test]
fn packed_depth_is_not_borrowed() {
    let samples = gradient(8, 2, 1, 12);
    let file = write_one(ByteOrder::Little, WriteImage::new(8, 2, 1, 12, samples.clone()));
    let output = decode(&file, Unstoppable).unwrap();
    assert!(!output.images[0].is_borrowed());
    assert_eq!(output.images[0].samples_u16().unwrap().len(), 16);
}

#[test]
fn tiles_clip_at_edges() {
    for order in ORDERS {
        for (spp, bits) in [(1, 16), (3, 8), (1, 12)] {
            let samples = gradient(40, 21, spp, bits);
            let file = write_one(
                order,
                WriteImage::new(40, 21, spp, bits, samples.clone()).with_tiles(16, 16),
            );
            let output = decode(&file, Unstoppable).unwrap();
            let image = &output.images[0];
            assert_eq!(image.tile_width, Some(16));
            assert_eq!(image.tile_offsets.len(), 3 * 2);
            assert!(!image.is_borrowed());
            assert_eq!(image.pixels(), &samples[..], "{order:?} {spp}x{bits}");
        }
    }
}

#[test]
fn planar_strips_and_tiles() {
    let samples = gradient(20, 18, 3, 16);
    let strips = write_one(
        ByteOrder::Big,
        WriteImage::new(20, 18, 3, 16, samples.clone())
            .planar(true)
            .with_rows_per_strip(5),
    );
    let output = decode(&strips, Unstoppable).unwrap();
    assert_eq!(output.images[0].planar_configuration, 2);
    assert_eq!(output.images[0].strip_offsets.len(), 4 * 3);
    assert_eq!(output.images[0].pixels(), &samples[..]);

    let tiles = write_one(
        ByteOrder::Little,
        WriteImage::new(20, 18, 3, 16, samples.clone())
            .planar(true)
            .with_tiles(16, 16),
    );
    let output = decode(&tiles, Unstoppable).unwrap();
    assert_eq!(output.images[0].tile_offsets.len(), 2 * 2 * 3);
    assert_eq!(output.images[0].pixels(), &samples[..]);
}

#[test]
fn planar_8bit_is_not_borrowed() {
    let samples = gradient(4, 4, 3, 8);
    let file = write_one(
        ByteOrder::Little,
        WriteImage::new(4, 4, 3, 8, samples.clone()).planar(true),
    );
    let output = decode(&file, Unstoppable).unwrap();
    assert!(!output.images[0].is_borrowed());
    assert_eq!(output.images[0].pixels(), &samples[..]);
}

#[cfg(feature = "deflate")]
#[test]
fn deflate_with_and_without_predictor() {
    for order in ORDERS {
        for (spp, bits, predictor) in [
            (1, 8, false),
            (1, 8, true),
            (3, 16, true),
            (1, 12, false),
            (4, 32, true),
        ] {
            let samples = gradient(33, 7, spp, bits);
            let file = write_one(
                order,
                WriteImage::new(33, 7, spp, bits, samples.clone())
                    .with_compression(WriteCompression::Deflate)
                    .with_predictor(predictor)
                    .with_rows_per_strip(3),
            );
            let output = decode(&file, Unstoppable).unwrap();
            let image = &output.images[0];
            assert_eq!(image.compression, Compression::Deflate);
            assert_eq!(image.predictor, if predictor { 2 } else { 1 });
            assert_eq!(image.pixels(), &samples[..], "{order:?} {spp}x{bits} {predictor}");
        }
    }
}

#[cfg(feature = "deflate")]
#[test]
fn deflate_float_predictor() {
    for order in ORDERS {
        let samples = float_ramp(17, 6, 3);
        let file = write_one(
            order,
            WriteImage::new(17, 6, 3, 32, samples.clone())
                .with_sample_format(SampleFormat::Float)
                .with_compression(WriteCompression::Deflate)
                .with_predictor(true)
                .with_tiles(16, 16),
        );
        let output = decode(&file, Unstoppable).unwrap();
        let image = &output.images[0];
        assert_eq!(image.predictor, 3);
        assert_eq!(image.sample_type(), SampleType::F32);
        assert_eq!(image.pixels(), &samples[..]);
        assert_eq!(image.samples_f32().unwrap()[1], 1.0 / 251.0);
    }
}

#[test]
fn predictor_rejected_for_packed_depths() {
    let err = DngWriter::new(ByteOrder::Little)
        .add_image(
            WriteImage::new(4, 4, 1, 12, gradient(4, 4, 1, 12))
                .with_compression(WriteCompression::Deflate)
                .with_predictor(true),
        )
        .write()
        .unwrap_err();
    assert!(matches!(err, DngError::InvalidData(_)));
}

#[test]
fn lossless_jpeg_whole_image() {
    for order in ORDERS {
        for (spp, bits) in [(1, 12), (1, 16), (3, 14), (2, 10)] {
            let samples = gradient(24, 11, spp, bits);
            let file = write_one(
                order,
                WriteImage::new(24, 11, spp, bits, samples.clone())
                    .with_compression(WriteCompression::LosslessJpeg),
            );
            let output = decode(&file, Unstoppable).unwrap();
            let image = &output.images[0];
            assert_eq!(image.compression, Compression::Jpeg);
            assert_eq!((image.width, image.height), (24, 11));
            assert_eq!(image.bits_per_sample, 16);
            assert_eq!(image.bits_per_sample_original, bits);
            assert_eq!(image.pixels(), &samples[..], "{order:?} {spp}x{bits}");
        }
    }
}

#[test]
fn lossless_jpeg_8bit_widens_to_16() {
    let samples = gradient(6, 4, 1, 8);
    let file = write_one(
        ByteOrder::Little,
        WriteImage::new(6, 4, 1, 8, samples.clone())
            .with_compression(WriteCompression::LosslessJpeg),
    );
    let output = decode(&file, Unstoppable).unwrap();
    let image = &output.images[0];
    assert_eq!(image.bits_per_sample, 16);
    assert_eq!(image.bits_per_sample_original, 8);
    assert_eq!(image.pixels(), &widen(&samples)[..]);
}

#[test]
fn lossless_jpeg_tiles_and_strips() {
    let samples = gradient(48, 20, 1, 14);
    let tiles = write_one(
        ByteOrder::Little,
        WriteImage::new(48, 20, 1, 14, samples.clone())
            .with_compression(WriteCompression::LosslessJpeg)
            .with_tiles(32, 16),
    );
    let output = decode(&tiles, Unstoppable).unwrap();
    assert_eq!(output.images[0].tile_offsets.len(), 2 * 2);
    assert_eq!(output.images[0].pixels(), &samples[..]);

    let strips = write_one(
        ByteOrder::Big,
        WriteImage::new(48, 20, 1, 14, samples.clone())
            .with_compression(WriteCompression::LosslessJpeg)
            .with_rows_per_strip(8),
    );
    let output = decode(&strips, Unstoppable).unwrap();
    assert_eq!(output.images[0].strip_offsets.len(), 3);
    assert_eq!(output.images[0].pixels(), &samples[..]);
}

#[test]
fn lossless_jpeg_is_unsigned_whatever_the_sample_format_tag() {
    let samples = gradient(32, 32, 1, 16);
    for tiled in [false, true] {
        let mut image = WriteImage::new(32, 32, 1, 16, samples.clone())
            .with_compression(WriteCompression::LosslessJpeg)
            .with_raw_tag(339, FieldType::Short, 1, 3u16.to_le_bytes().to_vec());
        if tiled {
            image = image.with_tiles(16, 16);
        }
        let file = write_one(ByteOrder::Little, image);
        let output = decode(&file, Unstoppable).unwrap();
        let image = &output.images[0];
        assert_eq!(image.sample_format, SampleFormat::Uint, "tiled {tiled}");
        assert_eq!(image.layout(), PixelLayout::GRAY16);
        assert_eq!(image.pixels(), &samples[..], "tiled {tiled}");
    }
}

#[test]
fn cr2_slices_are_reassembled() {
    let (w, h) = (20, 6);
    let samples = gradient(w, h, 1, 12);
    for slices in [[2, 8, 4], [1, 12, 8], [0, 0, 20]] {
        let file = write_one(
            ByteOrder::Little,
            WriteImage::new(w, h, 1, 12, samples.clone())
                .with_compression(WriteCompression::LosslessJpeg)
                .with_cr2_slices(slices),
        );
        let output = decode(&file, Unstoppable).unwrap();
        let image = &output.images[0];
        assert_eq!(image.cr2_slices, Some(slices));
        assert_eq!((image.width, image.height), (w, h));
        assert_eq!(image.samples_per_pixel, 1);
        assert_eq!(image.pixels(), &samples[..], "{slices:?}");
    }
}

#[test]
fn cr2_slices_must_cover_width() {
    let err = DngWriter::new(ByteOrder::Little)
        .add_image(
            WriteImage::new(20, 2, 1, 12, gradient(20, 2, 1, 12))
                .with_compression(WriteCompression::LosslessJpeg)
                .with_cr2_slices([2, 8, 2]),
        )
        .write()
        .unwrap_err();
    assert!(matches!(err, DngError::InvalidData(_)));
}

#[test]
fn dng_metadata_survives() {
    let cm1 = [[0.6722, -0.0635, -0.0963], [-0.4287, 1.246, 0.2028], [-0.0908, 0.2162, 0.5668]];
    let cal = [[1.02, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.97]];
    let fm1 = [[0.7978, 0.1352, 0.0313], [0.288, 0.7119, 0.0001], [0.0, 0.0, 0.8251]];
    let file = write_one(
        ByteOrder::Big,
        WriteImage::new(8, 8, 1, 14, gradient(8, 8, 1, 14))
            .with_dng_version([1, 4, 0, 0])
            .with_unique_camera_model("Test Camera")
            .with_cfa((2, 2), &[1, 0, 2, 1])
            .with_cfa_plane_color(&[0, 1, 2])
            .with_cfa_layout(1)
            .with_black_level(&[512.0])
            .with_white_level(&[15000])
            .with_color_matrix1(cm1)
            .with_forward_matrix1(fm1)
            .with_camera_calibration1(cal)
            .with_color_matrix2(cm1)
            .with_analog_balance([1.0, 1.0, 1.0])
            .with_as_shot_neutral([0.5, 1.0, 0.625])
            .with_calibration_illuminants(LightSource::StandardLightA, LightSource::D65)
            .with_active_area([2, 2, 6, 6])
            .with_orientation(6),
    );
    let output = decode(&file, Unstoppable).unwrap();
    let image = &output.images[0];
    assert!(image.is_dng());
    assert_eq!(image.version(), 0x0000_0401);
    assert_eq!(image.unique_camera_model.as_deref(), Some("Test Camera"));
    assert_eq!(image.photometric, Some(32803));
    assert_eq!(image.cfa_pattern_2x2(), Some([[1, 0], [2, 1]]));
    assert_eq!(image.cfa_color(3, 2), Some(2));
    assert_eq!(image.cfa_plane_color, [0, 1, 2]);
    assert_eq!(image.black_level, [512.0; 4]);
    assert_eq!(image.white_level, [15000; 4]);
    assert_eq!(image.color_matrix1, cm1);
    assert_eq!(image.color_matrix2, cm1);
    assert_eq!(image.camera_calibration1, cal);
    assert_eq!(image.camera_calibration2, IDENTITY);
    assert_eq!(image.forward_matrix1, fm1);
    assert_eq!(image.as_shot_neutral, Some([0.5, 1.0, 0.625]));
    assert_eq!(image.calibration_illuminant1, LightSource::StandardLightA);
    assert_eq!(image.calibration_illuminant2, LightSource::D65);
    assert_eq!(image.active_area, Some([2, 2, 6, 6]));
    assert_eq!(image.orientation, 6);
}

#[test]
fn white_level_defaults_to_depth() {
    let file = write_one(ByteOrder::Little, WriteImage::new(4, 2, 1, 12, gradient(4, 2, 1, 12)));
    let output = decode(&file, Unstoppable).unwrap();
    assert_eq!(output.images[0].white_level, [4095; 4]);
    assert_eq!(output.images[0].black_level, [0.0; 4]);
    assert_eq!(output.images[0].color_matrix1, IDENTITY);
    assert!(!output.images[0].is_dng());
}

#[test]
fn pnm_export_of_decoded_images() {
    let gray = gradient(5, 3, 1, 12);
    let file = write_one(
        ByteOrder::Little,
        WriteImage::new(5, 3, 1, 12, gray).with_white_level(&[4095]),
    );
    let output = decode(&file, Unstoppable).unwrap();
    let pgm = encode_pnm(&output.images[0], Unstoppable).unwrap();
    let header = b"P5\n5 3\n4095\n";
    assert_eq!(&pgm[..header.len()], header);
    assert_eq!(pgm.len(), header.len() + 5 * 3 * 2);
    let first = output.images[0].samples_u16().unwrap()[0];
    assert_eq!(&pgm[header.len()..header.len() + 2], &first.to_be_bytes());

    let rgb = gradient(2, 2, 3, 8);
    let file = write_one(ByteOrder::Little, WriteImage::new(2, 2, 3, 8, rgb.clone()));
    let output = decode(&file, Unstoppable).unwrap();
    let ppm = encode_pnm(&output.images[0], Unstoppable).unwrap();
    assert!(ppm.starts_with(b"P6\n2 2\n255\n"));
    assert!(ppm.ends_with(&rgb));
}

#[test]
fn pfm_export_is_bottom_up() {
    let samples = float_ramp(3, 2, 1);
    let file = write_one(
        ByteOrder::Little,
        WriteImage::new(3, 2, 1, 32, samples).with_sample_format(SampleFormat::Float),
    );
    let output = decode(&file, Unstoppable).unwrap();
    let pfm = encode_pnm(&output.images[0], Unstoppable).unwrap();
    let header = b"Pf\n3 2\n-1.0\n";
    assert!(pfm.starts_with(header));
    let body = &pfm[header.len()..];
    // First stored row is the bottom image row.
    assert_eq!(&body[..4], &(3.0f32 / 251.0).to_le_bytes());
}

#[cfg(feature = "imgref")]
#[test]
fn rgb8_imgref_view() {
    let rgb = gradient(4, 3, 3, 8);
    let file = write_one(ByteOrder::Little, WriteImage::new(4, 3, 3, 8, rgb.clone()));
    let output = decode(&file, Unstoppable).unwrap();
    let img = output.images[0].as_imgref::<rgb::RGB8>().unwrap();
    assert_eq!((img.width(), img.height()), (4, 3));
    assert_eq!(img.buf()[0], rgb::RGB8::new(rgb[0], rgb[1], rgb[2]));
    assert!(matches!(
        output.images[0].as_pixels::<rgb::RGBA8>(),
        Err(DngError::LayoutMismatch { .. })
    ));
}
