use std::sync::Arc;

use crate::process::parse::OutputMode;
use crate::structs::access_unit::AccessUnit;
use crate::structs::adts::{ADTS_HEADER_LENGTH, AdtsHeader};
use crate::structs::audio::AudioParams;
use crate::structs::superframe::SuperframeHeader;
use crate::utils::errors::EmitError;

/// Slices the access units of a parsed superframe out of `frame` and
/// packages them for the negotiated output mode.
///
/// Each descriptor in `header` addresses one bare AAC frame. In
/// [`OutputMode::Raw`] the payload is copied as is. In
/// [`OutputMode::Adts`] a 7 byte ADTS header derived from `params` is
/// prepended so the unit can be fed to any ADTS capable decoder.
///
/// Emission is all or nothing. If any unit cannot be packaged the whole
/// superframe is dropped and an error describes the offending unit.
pub fn emit_access_units(
    frame: &[u8],
    header: &SuperframeHeader,
    mode: OutputMode,
    params: &AudioParams,
) -> Result<Vec<AccessUnit>, EmitError> {
    let adts = match mode {
        OutputMode::Adts => Some(AdtsHeader::for_params(params)?),
        OutputMode::Raw => None,
    };

    let mut units = Vec::with_capacity(header.num_aus);

    for (index, au) in header.aus().iter().enumerate() {
        let start = au.start as usize;
        let size = au.size as usize;
        let end = start + size;

        let Some(payload) = frame.get(start..end) else {
            return Err(EmitError::AccessUnitOutOfBounds {
                index,
                start,
                end,
                len: frame.len(),
            });
        };

        let data: Arc<[u8]> = match &adts {
            Some(adts) => {
                let mut unit = Vec::with_capacity(ADTS_HEADER_LENGTH + size);
                unit.extend_from_slice(&adts.write(size)?);
                unit.extend_from_slice(payload);
                unit.into()
            }
            None => payload.into(),
        };

        units.push(AccessUnit { start, size, data });
    }

    Ok(units)
}

#[cfg(test)]
fn parsed_test_frame() -> (Vec<u8>, SuperframeHeader) {
    use crate::structs::superframe::build_superframe;
    use crate::utils::bitstream_io::BsIoSliceReader;

    let frame = build_superframe(600, 0x60, &[188, 370]);
    let mut reader = BsIoSliceReader::from_slice(&frame);
    let header = SuperframeHeader::read(&mut reader, frame.len()).unwrap();

    (frame, header)
}

#[test]
fn raw_mode_copies_payloads_exactly() {
    let (frame, header) = parsed_test_frame();
    let params = AudioParams::resolve(&header).unwrap();

    let units = emit_access_units(&frame, &header, OutputMode::Raw, &params).unwrap();

    assert_eq!(units.len(), 3);

    assert_eq!(units[0].start, 6);
    assert_eq!(units[0].size, 180);
    assert_eq!(units[0].as_ref(), &frame[6..186]);

    assert_eq!(units[1].start, 188);
    assert_eq!(units[1].size, 180);
    assert_eq!(units[1].as_ref(), &frame[188..368]);

    assert_eq!(units[2].start, 370);
    assert_eq!(units[2].size, 178);
    assert_eq!(units[2].as_ref(), &frame[370..548]);
}

#[test]
fn adts_mode_prepends_one_header_per_unit() {
    let (frame, header) = parsed_test_frame();
    let params = AudioParams::resolve(&header).unwrap();

    let units = emit_access_units(&frame, &header, OutputMode::Adts, &params).unwrap();

    assert_eq!(units.len(), 3);

    // 24 kHz mono, frame length 180 + 7
    let unit = &units[0];
    assert_eq!(unit.size, 180);
    assert_eq!(unit.as_ref().len(), 187);
    assert_eq!(
        &unit.as_ref()[..ADTS_HEADER_LENGTH],
        &[0xFF, 0xF1, 0x1A, 0x70, 0x17, 0x7F, 0xFC]
    );
    assert_eq!(&unit.as_ref()[ADTS_HEADER_LENGTH..], &frame[6..186]);

    for unit in &units {
        assert_eq!(unit.as_ref().len(), unit.size + ADTS_HEADER_LENGTH);
        assert_eq!(&unit.as_ref()[..2], &[0xFF, 0xF1]);
    }
}

#[test]
fn truncated_frame_is_rejected_whole() {
    let (frame, header) = parsed_test_frame();
    let params = AudioParams::resolve(&header).unwrap();

    let result = emit_access_units(&frame[..300], &header, OutputMode::Raw, &params);

    assert!(matches!(
        result,
        Err(EmitError::AccessUnitOutOfBounds {
            index: 1,
            start: 188,
            end: 368,
            len: 300,
        })
    ));
}
