#![no_main]
use libfuzzer_sys::fuzz_target;
use zendng::*;

fuzz_target!(|data: &[u8]| {
    // Rewriting a decoded image must read back to identical samples
    let limits = Limits {
        max_pixels: Some(1 << 20),
        max_memory_bytes: Some(16 << 20),
        max_ifds: Some(16),
        ..Default::default()
    };
    let Ok(decoded) = DecodeRequest::new(data)
        .with_limits(&limits)
        .decode(enough::Unstoppable)
    else {
        return;
    };
    let Some(image) = decoded.largest() else {
        return;
    };

    for compression in [
        WriteCompression::None,
        WriteCompression::Deflate,
        WriteCompression::LosslessJpeg,
    ] {
        let written = DngWriter::new(decoded.byte_order)
            .add_image(
                WriteImage::new(
                    image.width,
                    image.height,
                    image.samples_per_pixel,
                    image.bits_per_sample,
                    image.pixels(),
                )
                .with_sample_format(image.sample_format)
                .with_compression(compression),
            )
            .write();
        // Depths or formats a compression cannot store are rejected up front
        let Ok(written) = written else { continue };
        let Ok(reread) = decode(&written, enough::Unstoppable) else {
            panic!("rewritten {compression:?} file failed to decode");
        };
        let again = &reread.images[0];
        assert_eq!((again.width, again.height), (image.width, image.height));
        if again.bits_per_sample == image.bits_per_sample {
            assert_eq!(again.pixels(), image.pixels(), "{compression:?} pixel mismatch");
        }
    }
});
