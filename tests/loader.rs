//! The load-and-query harness contract.

mod common;

use common::*;
use zendng::*;

#[test]
fn reports_largest_image() {
    let raw = gradient(16, 8, 1, 12);
    let file = DngWriter::new(ByteOrder::Little)
        .add_image(
            WriteImage::new(4, 2, 3, 8, gradient(4, 2, 3, 8))
                .with_subfile_type(SUBFILE_REDUCED_IMAGE),
        )
        .add_image(WriteImage::new(16, 8, 1, 12, raw.clone()))
        .write()
        .unwrap();

    let loader = DngLoader::from_bytes(file);
    assert!(loader.is_valid());
    assert!(loader.error().is_none());
    assert_eq!(loader.largest_variant_index(), Some(1));
    assert_eq!(loader.width(), 16);
    assert_eq!(loader.height(), 8);
    assert_eq!(loader.channel_count(), 1);
    assert_eq!(loader.bit_depth(), 16);
    assert_eq!(loader.pixel_data(), &raw[..]);
    assert_eq!(loader.output().unwrap().images.len(), 2);
}

#[test]
fn pixel_data_length_matches_dimensions() {
    let file = write_one(
        ByteOrder::Big,
        WriteImage::new(10, 3, 3, 14, gradient(10, 3, 3, 14)).with_rows_per_strip(2),
    );
    let loader = DngLoader::from_bytes(file);
    let expected =
        loader.width() * loader.height() * loader.channel_count() * loader.bit_depth() / 8;
    assert_eq!(loader.pixel_data().len(), expected as usize);
}

#[test]
fn failed_load_is_empty() {
    for bytes in [Vec::new(), b"garbage!".to_vec(), vec![b'I', b'I', 42, 0, 8, 0, 0, 0]] {
        let loader = DngLoader::from_bytes(bytes);
        assert!(!loader.is_valid());
        assert!(loader.error().is_some());
        assert_eq!(loader.largest_variant_index(), None);
        assert_eq!(loader.width(), 0);
        assert_eq!(loader.height(), 0);
        assert_eq!(loader.channel_count(), 0);
        assert_eq!(loader.bit_depth(), 0);
        assert!(loader.pixel_data().is_empty());
        assert!(loader.largest().is_none());
    }
}

#[test]
fn limits_make_load_fail() {
    let image = WriteImage::new(64, 64, 1, 16, gradient(64, 64, 1, 16));
    let file = write_one(ByteOrder::Little, image);
    let limits = Limits {
        max_width: Some(32),
        ..Default::default()
    };
    let loader = DngLoader::with_limits(file.clone(), &limits);
    assert!(!loader.is_valid());
    assert!(matches!(loader.error(), Some(DngError::LimitExceeded(_))));

    let loader = DngLoader::with_limits(file, &Limits::default());
    assert!(loader.is_valid());
}

#[test]
fn configured_request() {
    let file = DngWriter::new(ByteOrder::Little)
        .chained()
        .add_image(WriteImage::new(4, 2, 1, 8, gradient(4, 2, 1, 8)))
        .add_image(
            WriteImage::new(8, 2, 1, 8, gradient(8, 2, 1, 8)).with_raw_tag(
                259,
                FieldType::Short,
                1,
                99u16.to_le_bytes().to_vec(),
            ),
        )
        .write()
        .unwrap();

    let lenient = DngLoader::from_request(DecodeRequest::new(&file));
    assert!(lenient.is_valid());
    assert_eq!(lenient.largest_variant_index(), Some(0));
    assert_eq!(lenient.width(), 4);
    assert_eq!(lenient.output().unwrap().warnings.len(), 1);

    let strict = DngLoader::from_request(DecodeRequest::new(&file).strict(true));
    assert!(!strict.is_valid());
    assert!(matches!(strict.error(), Some(DngError::UnsupportedCompression(99))));
}

#[cfg(feature = "std")]
#[test]
fn open_missing_file() {
    let loader = DngLoader::open("/nonexistent/zendng/raw.dng");
    assert!(!loader.is_valid());
    assert!(matches!(loader.error(), Some(DngError::Io(_))));
}

#[cfg(feature = "std")]
#[test]
fn open_from_disk() {
    let file = write_one(ByteOrder::Little, WriteImage::new(6, 4, 1, 16, gradient(6, 4, 1, 16)));
    let path = std::env::temp_dir().join(format!("zendng-loader-{}.dng", std::process::id()));
    std::fs::write(&path, &file).unwrap();
    let loader = DngLoader::open(&path);
    std::fs::remove_file(&path).unwrap();
    assert!(loader.is_valid());
    assert_eq!((loader.width(), loader.height()), (6, 4));
}
