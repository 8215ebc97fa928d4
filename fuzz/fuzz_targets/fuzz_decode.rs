#![no_main]
use libfuzzer_sys::fuzz_target;
use zendng::{DecodeRequest, DngLoader, Limits, RawDecoder};

fuzz_target!(|data: &[u8]| {
    let limits = Limits {
        max_pixels: Some(1 << 22),
        max_memory_bytes: Some(64 << 20),
        max_ifds: Some(64),
        ..Default::default()
    };

    // Lenient and strict decoding must never panic
    let _ = DecodeRequest::new(data)
        .with_limits(&limits)
        .decode(enough::Unstoppable);
    let _ = DecodeRequest::new(data)
        .with_limits(&limits)
        .strict(true)
        .decode(enough::Unstoppable);
    let _ = zendng::probe(data);

    // The harness view must stay consistent with itself
    let loader = DngLoader::with_limits(data.to_vec(), &limits);
    if loader.is_valid() {
        let expected = loader.width() as usize
            * loader.height() as usize
            * loader.channel_count() as usize
            * (loader.bit_depth() as usize / 8);
        assert_eq!(loader.pixel_data().len(), expected);
    } else {
        assert!(loader.pixel_data().is_empty());
    }
});
