//! Hardware-gated smoke test.
//!
//! Exercises the full construction/capture/teardown cycle when a capture
//! node is present; on machines without one (CI, containers) every test
//! here skips cleanly.

use v4lcap::{Capture, CaptureError, Config, PixelFormat};

/// Index of the first node that looks like a camera, if any.
fn first_device_index() -> Option<usize> {
    (0..8).find(|index| std::path::Path::new(&format!("/dev/video{}", index)).exists())
}

#[test]
fn unsupported_format_rejected_before_open() {
    // Construction must fail on the format check even with no device
    // attached to the system.
    let err = Capture::open(Config {
        pixel_format: PixelFormat::Invalid,
        device_index: 0,
        ..Config::default()
    })
    .err()
    .expect("invalid pixel format must not construct");
    assert!(matches!(err, CaptureError::UnsupportedFormat));
}

#[test]
fn missing_device_is_unavailable() {
    // Device indices are small; 250 should never exist.
    if std::path::Path::new("/dev/video250").exists() {
        eprintln!("skipping: /dev/video250 exists on this machine");
        return;
    }
    let err = Capture::open(Config {
        width: 640,
        height: 480,
        fps: 30,
        pixel_format: PixelFormat::Yuyv422,
        device_index: 250,
        ..Config::default()
    })
    .err()
    .expect("absent device must not construct");
    assert!(matches!(err, CaptureError::DeviceUnavailable { .. }));
}

#[test]
fn capture_loop_on_real_device() {
    let Some(index) = first_device_index() else {
        eprintln!("skipping: no /dev/video* node present");
        return;
    };

    let mut cap = match Capture::open(Config {
        width: 640,
        height: 480,
        fps: 30,
        pixel_format: PixelFormat::Yuyv422,
        device_index: index,
        num_buffers: 4,
        ..Config::default()
    }) {
        Ok(cap) => cap,
        Err(e) => {
            // Emulated or codec nodes may reject the format; that is not
            // what this test is about.
            eprintln!("skipping: /dev/video{} not usable: {}", index, e);
            return;
        }
    };

    assert_eq!(cap.num_planes(), 1);
    assert!(cap.num_buffers() >= 1);
    let width = cap.width();
    let height = cap.height();
    assert!(width > 0 && height > 0);

    let mut last_order = cap.frame_order();
    let mut delivered = 0;
    for _ in 0..10 {
        let frame = cap.get_frame_data();
        if !frame.is_empty() {
            delivered += 1;
            // A frame never reports more payload than the mapping holds.
            assert!(frame.planes()[0].len() <= (width * height * 2) as usize);
        }
        let order = cap.frame_order();
        assert!(order >= last_order);
        last_order = order;
    }
    eprintln!("{} of 10 capture calls delivered a frame", delivered);

    // Getters are stable across calls.
    assert_eq!(cap.width(), width);
    assert_eq!(cap.height(), height);
    assert_eq!(cap.pixel_format(), PixelFormat::Yuyv422);

    drop(cap);
    // Teardown released the single-open device, so it opens again.
    assert!(Capture::open(Config {
        width: 640,
        height: 480,
        fps: 30,
        pixel_format: PixelFormat::Yuyv422,
        device_index: index,
        num_buffers: 2,
        ..Config::default()
    })
    .is_ok());
}
