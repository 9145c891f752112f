/// Audio carried by one superframe, fixed by the 24 ms logical frame grid.
pub const SUPERFRAME_SECONDS: f64 = 0.12;

/// Playback time covered by `superframes` parsed superframes.
pub fn stream_duration(superframes: usize) -> f64 {
    superframes as f64 * SUPERFRAME_SECONDS
}

pub fn time_str(sec: f64) -> String {
    let ms = sec * 1000f64;
    let hours = (ms / 3600000f64) as u64;
    let minutes = ((ms % 3600000f64) / 60000f64) as u64;
    let seconds = ((ms % 60000f64) / 1000f64) as u64;
    let milliseconds = (ms % 1000f64) as u64;

    format!(
        "{hours:0width$}:{minutes:02}:{seconds:02}.{milliseconds:03}",
        width = if hours >= 100 { 0 } else { 2 }
    )
}

#[test]
fn formats_zero_duration() {
    assert_eq!(time_str(0.0), "00:00:00.000");
}

#[test]
fn formats_hours_minutes_seconds() {
    assert_eq!(time_str(3725.5), "01:02:05.500");
}

#[test]
fn superframe_count_maps_to_playback_time() {
    assert_eq!(time_str(stream_duration(250)), "00:00:30.000");
    assert_eq!(time_str(stream_duration(1000)), "00:02:00.000");
}
