//! Pattern documents: saving and loading a [`Session`] as JSON.
//!
//! Saving always writes the complete state. Loading is lenient: each field is
//! read and type-checked on its own, so a missing or malformed entry leaves the
//! current value in place instead of failing the whole load. Only an
//! unreadable file or invalid JSON is an error.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::audio_engine::constants::{NUM_BANDS, NUM_VOICES, STEP_COUNT};
use crate::audio_engine::errors::PatternError;
use crate::audio_engine::session::Session;
use crate::audio_engine::voice::{VoiceConfig, VoiceParam};

#[derive(Debug, Serialize)]
struct PatternDocument {
    sequence: Vec<Vec<u8>>,
    voices: Vec<VoiceDocument>,
    tempo: f32,
}

#[derive(Debug, Serialize)]
struct VoiceDocument {
    params: BTreeMap<String, f32>,
    eq: Vec<f32>,
    left_vol: f32,
    right_vol: f32,
    distortion: f32,
}

impl VoiceDocument {
    fn from_voice(voice: &VoiceConfig) -> Self {
        let params = VoiceParam::SCALARS
            .iter()
            .filter_map(|&param| Some((param.label(), voice.get(param)?)))
            .collect();

        Self {
            params,
            eq: voice.eq.to_vec(),
            left_vol: voice.left_gain,
            right_vol: voice.right_gain,
            distortion: voice.distortion,
        }
    }
}

impl PatternDocument {
    fn from_session(session: &Session) -> Self {
        let sequence = (0..NUM_VOICES)
            .filter_map(|voice_id| session.grid().row(voice_id))
            .map(|row| row.iter().map(|&active| u8::from(active)).collect())
            .collect();

        Self {
            sequence,
            voices: session.voices().iter().map(VoiceDocument::from_voice).collect(),
            tempo: session.bpm(),
        }
    }
}

/// Fields that were present but could not be applied during a load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// JSON paths of the skipped fields, e.g. `voices[1].params.A`.
    pub skipped: Vec<String>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    fn skip(&mut self, path: String) {
        log::warn!("Pattern field {path} has an unexpected type, keeping current value");
        self.skipped.push(path);
    }
}

/// Serializes the complete session as a pretty-printed pattern document.
pub fn to_json(session: &Session) -> Result<String, PatternError> {
    Ok(serde_json::to_string_pretty(&PatternDocument::from_session(
        session,
    ))?)
}

/// Writes the complete session to `path`.
pub fn save(session: &Session, path: &Path) -> Result<(), PatternError> {
    fs::write(path, to_json(session)?)?;
    log::info!("Saved pattern to {}", path.display());
    Ok(())
}

/// Reads and parses the document at `path`.
pub fn read(path: &Path) -> Result<Value, PatternError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Applies every usable field of `document` onto `session`.
pub fn apply(session: &mut Session, document: &Value) -> LoadReport {
    let mut report = LoadReport::default();

    let Some(root) = document.as_object() else {
        report.skip("$".into());
        return report;
    };

    if let Some(tempo) = root.get("tempo") {
        match tempo.as_f64() {
            Some(bpm) if session.set_tempo(bpm as f32).is_ok() => {}
            _ => report.skip("tempo".into()),
        }
    }

    if let Some(sequence) = root.get("sequence") {
        apply_sequence(session, sequence, &mut report);
    }

    if let Some(voices) = root.get("voices") {
        match voices.as_array() {
            Some(voices) => {
                for (voice_id, voice) in voices.iter().enumerate().take(NUM_VOICES) {
                    apply_voice(session, voice_id, voice, &mut report);
                }
            }
            None => report.skip("voices".into()),
        }
    }

    report
}

fn apply_sequence(session: &mut Session, sequence: &Value, report: &mut LoadReport) {
    let Some(rows) = sequence.as_array() else {
        report.skip("sequence".into());
        return;
    };

    for (voice_id, row) in rows.iter().enumerate().take(NUM_VOICES) {
        let Some(cells) = row.as_array() else {
            report.skip(format!("sequence[{voice_id}]"));
            continue;
        };

        for (step, cell) in cells.iter().enumerate().take(STEP_COUNT) {
            let active = match cell {
                Value::Bool(active) => Some(*active),
                Value::Number(n) => n.as_f64().map(|n| n != 0.0),
                _ => None,
            };

            match active {
                Some(active) if session.set_step(voice_id, step, active).is_ok() => {}
                _ => report.skip(format!("sequence[{voice_id}][{step}]")),
            }
        }
    }
}

fn apply_voice(session: &mut Session, voice_id: usize, voice: &Value, report: &mut LoadReport) {
    let Some(fields) = voice.as_object() else {
        report.skip(format!("voices[{voice_id}]"));
        return;
    };

    for (key, value) in fields {
        let path = format!("voices[{voice_id}].{key}");
        match key.as_str() {
            "params" => match value.as_object() {
                Some(params) => apply_params(session, voice_id, params, &path, report),
                None => report.skip(path),
            },
            "eq" => match value.as_array() {
                Some(bands) => {
                    for (band, gain) in bands.iter().enumerate().take(NUM_BANDS) {
                        apply_number(
                            session,
                            voice_id,
                            VoiceParam::EqBand(band),
                            gain,
                            format!("{path}[{band}]"),
                            report,
                        );
                    }
                }
                None => report.skip(path),
            },
            _ => match key.parse::<VoiceParam>() {
                Ok(param) => apply_number(session, voice_id, param, value, path, report),
                Err(_) => log::debug!("Ignoring unknown pattern field {path}"),
            },
        }
    }
}

fn apply_params(
    session: &mut Session,
    voice_id: usize,
    params: &Map<String, Value>,
    path: &str,
    report: &mut LoadReport,
) {
    for (name, value) in params {
        let path = format!("{path}.{name}");
        match name.parse::<VoiceParam>() {
            Ok(param) => apply_number(session, voice_id, param, value, path, report),
            Err(_) => log::debug!("Ignoring unknown pattern field {path}"),
        }
    }
}

fn apply_number(
    session: &mut Session,
    voice_id: usize,
    param: VoiceParam,
    value: &Value,
    path: String,
    report: &mut LoadReport,
) {
    let number = match value {
        Value::Number(n) => n.as_f64().map(|n| n as f32),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    };

    match number {
        Some(number) if session.set_parameter(voice_id, param, number).is_ok() => {}
        _ => report.skip(path),
    }
}
