//! The canonical model in serialized form.
//!
//! A binary chart is the magic `JLC1` followed by the `bincode` encoding of the
//! serde representation of a [`Chart`]. Derived fields are not stored; they
//! are recomputed when the chart is prepared for play.

use crate::{
    error::{ChartError, Result},
    model::Chart,
};

/// Bytes every binary chart starts with.
pub const MAGIC: &[u8; 4] = b"JLC1";

/// Decodes a binary chart.
///
/// # Errors
///
/// Returns [`ChartError::Binary`] for a missing magic or undecodable payload,
/// and [`ChartError::UnsupportedFeature`] if the crate was built without the
/// `binary` feature.
pub fn decode(bytes: &[u8]) -> Result<Chart> {
    let payload = bytes
        .strip_prefix(MAGIC)
        .ok_or_else(|| ChartError::Binary("missing `JLC1` magic".into()))?;
    decode_payload(payload)
}

#[cfg(feature = "binary")]
fn decode_payload(payload: &[u8]) -> Result<Chart> {
    let (chart, read) =
        bincode::serde::decode_from_slice::<Chart, _>(payload, bincode::config::standard())
            .map_err(|err| ChartError::Binary(err.to_string()))?;
    if read != payload.len() {
        log::warn!(
            "binary chart has {} trailing bytes",
            payload.len() - read
        );
    }
    Ok(chart)
}

#[cfg(not(feature = "binary"))]
fn decode_payload(_: &[u8]) -> Result<Chart> {
    Err(ChartError::UnsupportedFeature {
        feature: "binary charts (enable the `binary` feature)".into(),
        offset: 0,
    })
}

/// Encodes `chart` into the binary form, leaving derived fields out.
///
/// # Errors
///
/// Returns [`ChartError::Binary`] if encoding fails.
#[cfg(feature = "binary")]
pub fn encode(chart: &Chart) -> Result<Vec<u8>> {
    let mut bytes = MAGIC.to_vec();
    bytes.extend(
        bincode::serde::encode_to_vec(chart, bincode::config::standard())
            .map_err(|err| ChartError::Binary(err.to_string()))?,
    );
    Ok(bytes)
}

#[cfg(all(test, feature = "binary"))]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{BpmEvent, Note, NoteKind};

    #[test]
    fn derived_fields_are_not_stored() {
        let mut chart = Chart::default();
        chart.ensure_unit(0);
        chart.bpm_events.push(BpmEvent {
            begin_beats: 0.0,
            bpm: 150.0,
        });
        let mut note = Note::new(NoteKind::Tap, 0, 2.0, 2.0);
        note.judge_time_ms = 800.0;
        chart.notes.push(note);
        chart.rebuild_buckets();

        let decoded = decode(&encode(&chart).expect("encode")).expect("decode");
        assert_eq!(decoded.bpm_events, chart.bpm_events);
        assert_eq!(decoded.notes[0].begin_beats, 2.0);
        assert_eq!(decoded.notes[0].judge_time_ms, 0.0);
        assert!(decoded.note_buckets.is_empty());
    }

    #[test]
    fn magic_is_required() {
        assert!(matches!(decode(b"JLC0...."), Err(ChartError::Binary(_))));
    }
}
