use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::Level;
use serde::Serialize;

use super::command::{Cli, InfoArgs};
use crate::input::InputReader;
use crate::timestamp::{SUPERFRAME_SECONDS, stream_duration, time_str};
use crate::window::run_stream;
use dabplus::process::parse::{OutputMode, ParsedSuperframe, Parser};
use dabplus::structs::audio::AudioParams;
use dabplus::structs::superframe::SUPERFRAME_MIN_SIZE;

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Analyzing DAB+ stream: {}", args.input.display());

    let mut input_reader = InputReader::new(&args.input)?;
    let mut parser = Parser::default();

    // Configure fail level based on strict mode
    let fail_level = if cli.strict {
        Level::Warn
    } else {
        Level::Error
    };
    parser.set_fail_level(fail_level);

    let pb = if let Some(multi) = multi {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb.set_message("Analyzing superframes...");
        Some(pb)
    } else {
        None
    };

    let mut stream_info: Option<StreamInfo> = None;
    let mut audio_bytes = 0u64;

    let mut accept_all = |_: OutputMode, _: &AudioParams| true;

    let stats = run_stream(
        &mut input_reader,
        &mut parser,
        &mut accept_all,
        |superframe| {
            if stream_info.is_none() {
                stream_info = Some(StreamInfo::from_superframe(superframe));
            }

            audio_bytes += superframe
                .access_units
                .iter()
                .map(|unit| unit.size as u64)
                .sum::<u64>();

            Ok(())
        },
    )?;

    if let Some(ref pb) = pb {
        pb.finish_and_clear();
    }

    let Some(stream) = stream_info else {
        println!("No DAB+ superframe found in the input.");
        println!("This doesn't appear to be a valid DAB+ audio stream.");
        return Ok(());
    };

    let totals = StreamTotals::new(&parser, &stream, audio_bytes, stats.bytes_read);
    let report = StreamReport { stream, totals };

    if args.yaml {
        print!("{}", serde_yaml_ng::to_string(&report)?);
    } else {
        report.print();
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct StreamReport {
    stream: StreamInfo,
    totals: StreamTotals,
}

/// Configuration of the stream, taken from the first parsed superframe.
#[derive(Debug, Serialize)]
struct StreamInfo {
    superframe_size: usize,
    audio_codec: String,
    core_sample_rate: u32,
    channels: u8,
    sbr: bool,
    parametric_stereo: bool,
    surround_config: u8,
    access_units_per_frame: usize,
    first_frame_au_sizes: Vec<u16>,
}

/// Whole-stream counters, final once the input is exhausted.
#[derive(Debug, Serialize)]
struct StreamTotals {
    superframes: usize,
    access_units: usize,
    sync_losses: usize,
    stream_bytes: u64,
    audio_bytes: u64,
    mean_au_size: f64,
    duration: String,
    audio_bitrate_kbps: f64,
    subchannel_bitrate_kbps: f64,
}

impl StreamInfo {
    fn from_superframe(superframe: &ParsedSuperframe) -> Self {
        let header = &superframe.header;

        let audio_codec = match (header.sbr_flag, header.ps_flag) {
            (true, true) => "HE-AAC v2",
            (true, false) => "HE-AAC",
            (false, _) => "AAC-LC",
        }
        .to_string();

        Self {
            superframe_size: superframe.consumed,
            audio_codec,
            core_sample_rate: superframe.params.sample_rate,
            channels: superframe.params.channels,
            sbr: header.sbr_flag,
            parametric_stereo: header.ps_flag,
            surround_config: header.mpeg_surround_config,
            access_units_per_frame: header.num_aus,
            first_frame_au_sizes: header.aus().iter().map(|au| au.size).collect(),
        }
    }
}

impl StreamTotals {
    fn new(parser: &Parser, stream: &StreamInfo, audio_bytes: u64, bytes_read: u64) -> Self {
        let seconds = stream_duration(parser.superframes_parsed());
        let access_units = parser.access_units_emitted();

        Self {
            superframes: parser.superframes_parsed(),
            access_units,
            sync_losses: parser.sync_losses(),
            stream_bytes: bytes_read,
            audio_bytes,
            mean_au_size: round_tenths(audio_bytes as f64 / access_units as f64),
            duration: time_str(seconds),
            audio_bitrate_kbps: round_tenths(audio_bytes as f64 * 8.0 / (seconds * 1000.0)),
            subchannel_bitrate_kbps: round_tenths(
                stream.superframe_size as f64 * 8.0 / (SUPERFRAME_SECONDS * 1000.0),
            ),
        }
    }
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl StreamReport {
    fn print(&self) {
        let stream = &self.stream;
        let totals = &self.totals;

        println!();
        println!("DAB+ Stream Information");
        println!("=======================");
        println!();
        println!(
            "Superframe size             {} bytes ({} x {})",
            stream.superframe_size,
            stream.superframe_size / SUPERFRAME_MIN_SIZE,
            SUPERFRAME_MIN_SIZE
        );
        println!("Audio codec                 {}", stream.audio_codec);
        println!("Core sample rate            {} Hz", stream.core_sample_rate);
        println!("Channels                    {}", stream.channels);
        if stream.surround_config != 0 {
            println!("MPEG surround config        {}", stream.surround_config);
        }
        println!(
            "Access units per frame      {}",
            stream.access_units_per_frame
        );

        let sizes = stream
            .first_frame_au_sizes
            .iter()
            .map(|size| size.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        println!("First frame AU sizes        {sizes}");

        println!();
        println!("Analysis Summary");
        println!("  Superframes processed     {}", totals.superframes);
        println!("  Access units              {}", totals.access_units);
        println!("  Sync losses               {}", totals.sync_losses);

        let size_mb = totals.stream_bytes as f64 / 1_000_000.0;
        println!(
            "  Size                      {size_mb:.2} MB ({} bytes)",
            totals.stream_bytes
        );
        println!("  Audio payload             {} bytes", totals.audio_bytes);
        println!("  Mean AU size              {:.1} bytes", totals.mean_au_size);
        println!("  Duration                  {}", totals.duration);
        println!(
            "  Audio bitrate             {:.1} kbps",
            totals.audio_bitrate_kbps
        );
        println!(
            "  Subchannel bitrate        {:.1} kbps",
            totals.subchannel_bitrate_kbps
        );
        println!();
    }
}
