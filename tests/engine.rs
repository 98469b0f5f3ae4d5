use rsplayback::{ColorRange, Location, Media, MediaError, Options, Rational};

#[test]
fn init_fails_on_nonexistent_input() {
    let result = Media::builder("/no/such/file.mp4")
        .on_video(|_| {})
        .build();
    assert!(matches!(result, Err(MediaError::OpenFailed(_))));
}

#[test]
fn init_fails_on_malformed_network_input() {
    // "://invalid" classifies as a network input but cannot be opened
    let source = Location::new("://invalid");
    assert!(source.is_network());

    let result = Media::builder(source).on_stopped(|| {}).build();
    assert!(result.is_err());
}

#[test]
fn init_failure_reports_open_error() -> anyhow::Result<()> {
    let err = match Media::builder("/no/such/file.mp4").build() {
        Ok(_) => anyhow::bail!("open of a missing file succeeded"),
        Err(err) => err,
    };
    let message = err.to_string();
    assert!(message.contains("failed to open input"), "got: {message}");
    Ok(())
}

#[test]
fn unknown_format_hint_still_fails_cleanly() {
    let result = Media::builder("/no/such/file.mp4")
        .with_format_hint("definitely-not-a-demuxer")
        .with_hardware_decoding(false)
        .with_force_range(ColorRange::Full)
        .build();
    assert!(result.is_err());
}

#[test]
fn demuxer_options_survive_the_builder() {
    let mut options = Options::preset_rtsp_transport_tcp();
    options.set("probesize", "32768");
    assert_eq!(options.get("rtsp_transport").as_deref(), Some("tcp"));
    assert_eq!(options.get("probesize").as_deref(), Some("32768"));
}

#[test]
fn host_timebase_is_nanoseconds() {
    assert_eq!(Rational::NANOSECONDS.numerator(), 1);
    assert_eq!(Rational::NANOSECONDS.denominator(), 1_000_000_000);
    // one tick of a 600-unit timebase (mov) is 1.666_666 ms
    assert_eq!(
        Rational::new(1, 600).rescale(1, Rational::NANOSECONDS),
        1_666_667
    );
}
