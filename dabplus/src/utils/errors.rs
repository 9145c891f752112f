#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $state.fail_level {
            return Err($err);
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    #[error(
        "Access unit {index} has no room for its trailing CRC: start {start}, next start {next}"
    )]
    StartsOutOfOrder { index: usize, start: u16, next: u16 },

    #[error(
        "Access unit {index} runs past the audio payload: start {start}, payload ends at {end}"
    )]
    TableBeyondPayload { index: usize, start: u16, end: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum ParamsError {
    #[error("Unsupported mpeg_surround_config {0}")]
    UnsupportedSurroundConfig(u8),
}

#[derive(thiserror::Error, Debug)]
pub enum EmitError {
    #[error("No ADTS profile for audio object type {0}")]
    UnsupportedAudioProfile(u8),

    #[error("No ADTS sampling frequency index for {0} Hz")]
    UnsupportedSampleRate(u32),

    #[error("No ADTS channel configuration for {0} channels")]
    UnsupportedChannelCount(u8),

    #[error("ADTS frame length {size} out of range (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Access unit {index} out of bounds: {start}..{end} in a {len} byte superframe")]
    AccessUnitOutOfBounds {
        index: usize,
        start: usize,
        end: usize,
        len: usize,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("Superframe sync lost at stream offset {offset}")]
    SyncLost { offset: u64 },

    #[error("Output mode not negotiated")]
    NotNegotiated,
}
