use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::Level;

use super::command::{Cli, ExtractArgs, OutputFormat};
use crate::input::InputReader;
use crate::window::run_stream;
use dabplus::process::parse::{OutputMode, Parser};
use dabplus::structs::audio::AudioParams;

pub fn cmd_extract(args: &ExtractArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Unpacking DAB+ stream: {}", args.input.display());

    let mut input_reader = InputReader::new(&args.input)?;

    let output_path = match &args.output {
        Some(path) => path.clone(),
        None if input_reader.is_pipe() => PathBuf::from("-"),
        None => args.input.with_extension(args.format.extension()),
    };

    let mut writer: Box<dyn Write> = if output_path.as_os_str() == "-" {
        Box::new(io::stdout().lock())
    } else {
        log::info!("Writing access units to {}", output_path.display());
        Box::new(BufWriter::new(File::create(&output_path)?))
    };

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
        pb.set_style(ProgressStyle::with_template(
            "{spinner:.green} {pos} superframes\n{msg} | elapsed: {elapsed_precise}",
        )?);
        pb.set_message("waiting for superframe sync");
        Some(pb)
    } else {
        None
    };

    let wanted = match args.format {
        OutputFormat::Adts => OutputMode::Adts,
        OutputFormat::Raw => OutputMode::Raw,
    };
    let mut downstream = |mode: OutputMode, _: &AudioParams| mode == wanted;

    let mut bytes_written = 0u64;

    let result = run_stream(
        &mut input_reader,
        &mut parser,
        &mut downstream,
        |superframe| {
            for unit in &superframe.access_units {
                let payload = unit.as_ref();
                writer.write_all(payload)?;
                bytes_written += payload.len() as u64;
            }

            if let Some(ref pb) = pb {
                pb.inc(1);
                if superframe.params_changed {
                    pb.set_message(format!(
                        "{} Hz, {} ch",
                        superframe.params.sample_rate, superframe.params.channels
                    ));
                }
            }

            Ok(())
        },
    );

    let stats = match result {
        Ok(stats) => stats,
        Err(e) => {
            if let Some(ref pb) = pb {
                pb.finish_with_message("extract failed");
            }
            return Err(e);
        }
    };

    writer.flush()?;

    if let Some(ref pb) = pb {
        pb.finish_with_message(format!("wrote {bytes_written} bytes"));
    }

    log::info!(
        "unpacked {} access units from {} superframes ({} bytes written, {} sync losses)",
        parser.access_units_emitted(),
        parser.superframes_parsed(),
        bytes_written,
        parser.sync_losses(),
    );

    if stats.leftover > 0 {
        log::debug!("{} trailing bytes were not parsed", stats.leftover);
    }

    Ok(())
}
