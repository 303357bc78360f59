//! Project Document
//!
//! The persisted form of a project: track metadata plus one opaque audio
//! reference per track. Samples are never embedded in the document; they are
//! handed to an [`AudioEncoder`] and stored beside it, addressed by content
//! hash.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::store::TrackStore;
use super::track::{ProjectState, RepeatRegion, Track};
use crate::engine::{AudioDecoder, AudioEncoder, ExportSettings, SampleBuffer};
use crate::error::{CadenzaError, Result};

/// Schema version written into new documents.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Document file inside a project directory.
pub const PROJECT_FILE: &str = "project.json";

/// Payload directory inside a project directory.
pub const AUDIO_DIR: &str = "audio";

/// Hex digits of the SHA-256 kept in an audio reference.
const REF_LEN: usize = 16;

/// Persisted project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDocument {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    pub project_name: String,

    /// When the document was produced; absent in hand-written documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,

    /// Tracks in display order.
    pub tracks: Vec<TrackDocument>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_region: Option<RepeatRegion>,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

/// Metadata of one persisted track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDocument {
    pub name: String,
    pub volume: f32,
    pub pan: f32,
    pub muted: bool,
    pub soloed: bool,

    #[serde(default)]
    pub background_color: Option<String>,

    /// Content reference of the audio payload; `None` for an empty track.
    #[serde(default)]
    pub audio_ref: Option<String>,
}

/// Content reference for a buffer: a SHA-256 prefix over rate, layout and samples
pub fn audio_ref(buffer: &SampleBuffer) -> String {
    let mut hasher = Sha256::new();
    hasher.update(buffer.sample_rate().to_le_bytes());
    hasher.update((buffer.num_channels() as u32).to_le_bytes());
    for channel in buffer.channels() {
        for sample in channel {
            hasher.update(sample.to_le_bytes());
        }
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..REF_LEN].to_string()
}

fn check_ref(reference: &str) -> Result<()> {
    if reference.len() == REF_LEN && reference.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(CadenzaError::corrupt_project(format!(
            "malformed audio reference '{}'",
            reference
        )))
    }
}

impl TrackDocument {
    fn from_track(track: &Track) -> Self {
        Self {
            name: track.name().to_string(),
            volume: track.volume(),
            pan: track.pan(),
            muted: track.is_muted(),
            soloed: track.is_soloed(),
            background_color: track.background_color().map(str::to_string),
            audio_ref: track.buffer().map(audio_ref),
        }
    }

    fn validate(&self, index: usize) -> Result<()> {
        if !(self.volume.is_finite() && self.volume >= 0.0) {
            return Err(CadenzaError::corrupt_project(format!(
                "track {} has invalid volume {}",
                index, self.volume
            )));
        }
        if !(self.pan.is_finite() && (-1.0..=1.0).contains(&self.pan)) {
            return Err(CadenzaError::corrupt_project(format!(
                "track {} has invalid pan {}",
                index, self.pan
            )));
        }
        if let Some(reference) = &self.audio_ref {
            check_ref(reference)?;
        }
        Ok(())
    }
}

impl ProjectDocument {
    /// Describe the store's tracks and repeat region.
    pub fn from_store(project_name: impl Into<String>, store: &TrackStore) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            project_name: project_name.into(),
            saved_at: Some(Utc::now()),
            tracks: store.tracks().iter().map(TrackDocument::from_track).collect(),
            repeat_region: store.repeat_region(),
        }
    }

    /// Parse a document, mapping any structural problem to `CorruptProject`.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: Self = serde_json::from_str(json)
            .map_err(|e| CadenzaError::corrupt_project(format!("unreadable document: {}", e)))?;
        document.validate()?;
        Ok(document)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every field a load depends on.
    pub fn validate(&self) -> Result<()> {
        let major = self.schema_version.split('.').next().unwrap_or_default();
        if major != "1" {
            return Err(CadenzaError::corrupt_project(format!(
                "unsupported schema version {}",
                self.schema_version
            )));
        }
        for (index, track) in self.tracks.iter().enumerate() {
            track.validate(index)?;
        }
        if let Some(region) = self.repeat_region {
            RepeatRegion::new(region.start, region.end).map_err(|e| {
                CadenzaError::corrupt_project(format!("invalid repeat region: {}", e))
            })?;
        }
        Ok(())
    }

    /// Distinct payload references, in first-use order.
    pub fn audio_refs(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = Vec::new();
        for reference in self.tracks.iter().filter_map(|t| t.audio_ref.as_deref()) {
            if !refs.contains(&reference) {
                refs.push(reference);
            }
        }
        refs
    }

    /// Rebuild the undoable store state.
    ///
    /// `payload` maps an audio reference to its decoded buffer. Any failure,
    /// including a payload that cannot be produced, is `CorruptProject`.
    pub fn into_state<F>(self, mut payload: F) -> Result<ProjectState>
    where
        F: FnMut(&str) -> Result<SampleBuffer>,
    {
        self.validate()?;
        let mut tracks = Vec::with_capacity(self.tracks.len());
        for doc in self.tracks {
            let buffer = match &doc.audio_ref {
                Some(reference) => Some(payload(reference).map_err(|e| match e {
                    CadenzaError::CorruptProject { .. } => e,
                    other => CadenzaError::corrupt_project(format!(
                        "audio '{}' for track '{}': {}",
                        reference, doc.name, other
                    )),
                })?),
                None => None,
            };
            let mut track = Track::new(doc.name, buffer);
            track.volume = doc.volume;
            track.pan = doc.pan;
            track.muted = doc.muted;
            track.soloed = doc.soloed;
            track.background_color = doc.background_color;
            tracks.push(track);
        }
        Ok(ProjectState {
            tracks,
            repeat_region: self.repeat_region,
        })
    }
}

impl TrackStore {
    /// Replace the store's contents with a document, all or nothing.
    ///
    /// On error the store is untouched.
    pub fn load_document<F>(&mut self, document: ProjectDocument, payload: F) -> Result<()>
    where
        F: FnMut(&str) -> Result<SampleBuffer>,
    {
        let name = document.project_name.clone();
        let state = document.into_state(payload)?;
        let count = state.tracks.len();
        self.load_state(state, format!("Load project '{}'", name));
        info!("Loaded project '{}' with {} tracks", name, count);
        Ok(())
    }
}

// ============================================================================
// Project directories
// ============================================================================

/// Path of the document inside a project directory.
pub fn project_file_path(dir: &Path) -> PathBuf {
    dir.join(PROJECT_FILE)
}

fn payload_path(dir: &Path, reference: &str) -> PathBuf {
    dir.join(AUDIO_DIR).join(format!("{}.wav", reference))
}

/// Write `project.json` and one payload per distinct buffer.
///
/// Payloads are written as 32-bit float WAV so a save/load cycle is lossless.
pub fn save_project_dir(
    dir: &Path,
    project_name: &str,
    store: &TrackStore,
    encoder: &dyn AudioEncoder,
) -> Result<ProjectDocument> {
    let document = ProjectDocument::from_store(project_name, store);
    fs::create_dir_all(dir.join(AUDIO_DIR))?;

    let settings = ExportSettings::wav(32)?;
    for (track, doc) in store.tracks().iter().zip(&document.tracks) {
        let (Some(buffer), Some(reference)) = (track.buffer(), doc.audio_ref.as_deref()) else {
            continue;
        };
        let path = payload_path(dir, reference);
        if path.exists() {
            debug!("Payload {} already on disk", reference);
            continue;
        }
        fs::write(&path, encoder.encode(buffer, &settings)?)?;
    }

    fs::write(project_file_path(dir), document.to_json()?)?;
    info!(
        "Saved project '{}' ({} tracks) to {:?}",
        project_name,
        document.tracks.len(),
        dir
    );
    Ok(document)
}

/// Read and validate the document without touching any payload.
pub fn read_project_document(dir: &Path) -> Result<ProjectDocument> {
    let path = project_file_path(dir);
    let json = fs::read_to_string(&path).map_err(|e| {
        CadenzaError::corrupt_project(format!("cannot read {:?}: {}", path, e))
    })?;
    ProjectDocument::from_json(&json)
}

/// Load a project directory into `store`.
///
/// Every payload is decoded before the store is touched.
pub fn load_project_dir(
    dir: &Path,
    store: &mut TrackStore,
    decoder: &dyn AudioDecoder,
) -> Result<ProjectDocument> {
    let document = read_project_document(dir)?;

    let mut decoded: HashMap<String, SampleBuffer> = HashMap::new();
    for reference in document.audio_refs() {
        let path = payload_path(dir, reference);
        let bytes = fs::read(&path).map_err(|e| {
            CadenzaError::corrupt_project(format!("missing audio {:?}: {}", path, e))
        })?;
        let buffer = decoder.decode(&bytes).map_err(|e| {
            CadenzaError::corrupt_project(format!("unreadable audio {:?}: {}", path, e))
        })?;
        decoded.insert(reference.to_string(), buffer);
    }

    store.load_document(document.clone(), |reference| {
        decoded
            .get(reference)
            .cloned()
            .ok_or_else(|| CadenzaError::corrupt_project(format!("no audio for '{}'", reference)))
    })?;
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::WavCodec;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn tone(len: usize) -> SampleBuffer {
        let samples = (0..len).map(|i| (i as f32 * 0.1).sin() * 0.5).collect();
        SampleBuffer::mono(samples, 8000).unwrap()
    }

    fn populated_store() -> TrackStore {
        let mut store = TrackStore::default();
        let a = store.add_track("Drums", Some(tone(800)));
        store.add_track("Empty", None);
        let c = store.add_track("Bass", Some(tone(400)));
        store.set_volume(a, 0.7).unwrap();
        store.set_pan(c, -0.25).unwrap();
        store.set_soloed(c, true).unwrap();
        store
            .set_background_color(a, Some("#aa3300".to_string()))
            .unwrap();
        store
            .set_repeat_region(Some(RepeatRegion::new(0.01, 0.05).unwrap()))
            .unwrap();
        store
    }

    #[test]
    fn test_document_json_field_names() {
        let store = populated_store();
        let json = ProjectDocument::from_store("Demo", &store).to_json().unwrap();
        assert!(json.contains("\"projectName\": \"Demo\""));
        assert!(json.contains("\"backgroundColor\": \"#aa3300\""));
        assert!(json.contains("\"audioRef\""));
    }

    #[test]
    fn test_audio_ref_is_content_addressed() {
        assert_eq!(audio_ref(&tone(100)), audio_ref(&tone(100)));
        assert_ne!(audio_ref(&tone(100)), audio_ref(&tone(101)));
        assert_eq!(audio_ref(&tone(10)).len(), REF_LEN);
    }

    #[test]
    fn test_missing_field_is_corrupt() {
        let err = ProjectDocument::from_json(r#"{"projectName": "x"}"#).unwrap_err();
        assert_eq!(err.error_code(), "CORRUPT_PROJECT");
    }

    #[test]
    fn test_minimal_document_loads() {
        let json = r#"{
            "projectName": "Minimal",
            "tracks": [
                {
                    "name": "Vox",
                    "volume": 0.8,
                    "pan": -0.5,
                    "muted": false,
                    "soloed": true,
                    "backgroundColor": null,
                    "audioRef": null
                }
            ]
        }"#;
        let document = ProjectDocument::from_json(json).unwrap();
        assert_eq!(document.project_name, "Minimal");
        assert_eq!(document.schema_version, SCHEMA_VERSION);
        assert!(document.saved_at.is_none());
        assert!(document.validate().is_ok());

        let mut store = TrackStore::default();
        store
            .load_document(document, |reference| {
                Err(CadenzaError::corrupt_project(format!("unexpected {}", reference)))
            })
            .unwrap();
        assert_eq!(store.tracks().len(), 1);
        assert_eq!(store.tracks()[0].name(), "Vox");
        assert!(store.tracks()[0].is_soloed());
        assert!(store.tracks()[0].buffer().is_none());
    }

    #[test]
    fn test_bad_values_are_corrupt() {
        let store = populated_store();
        let mut document = ProjectDocument::from_store("Demo", &store);
        document.tracks[0].pan = 3.0;
        assert!(document.validate().is_err());

        let mut document = ProjectDocument::from_store("Demo", &store);
        document.tracks[0].audio_ref = Some("../../etc/passwd".to_string());
        assert_eq!(
            document.validate().unwrap_err().error_code(),
            "CORRUPT_PROJECT"
        );
    }

    #[test]
    fn test_directory_roundtrip() {
        let dir = tempdir().unwrap();
        let original = populated_store();
        save_project_dir(dir.path(), "Demo", &original, &WavCodec).unwrap();

        let mut loaded = TrackStore::default();
        let document = load_project_dir(dir.path(), &mut loaded, &WavCodec).unwrap();
        assert_eq!(document.project_name, "Demo");
        assert_eq!(loaded.tracks().len(), 3);
        assert_eq!(loaded.repeat_region(), original.repeat_region());

        for (a, b) in original.tracks().iter().zip(loaded.tracks()) {
            assert_eq!(a.name(), b.name());
            assert_eq!(a.volume(), b.volume());
            assert_eq!(a.pan(), b.pan());
            assert_eq!(a.is_soloed(), b.is_soloed());
            assert_eq!(a.background_color(), b.background_color());
            assert_eq!(a.buffer(), b.buffer());
        }
        assert_eq!(loaded.current_track(), Some(loaded.tracks()[0].id()));
        assert!(loaded.can_undo());
    }

    #[test]
    fn test_missing_payload_leaves_store_untouched() {
        let dir = tempdir().unwrap();
        save_project_dir(dir.path(), "Demo", &populated_store(), &WavCodec).unwrap();
        let document = read_project_document(dir.path()).unwrap();
        let victim = document.audio_refs()[0].to_string();
        fs::remove_file(payload_path(dir.path(), &victim)).unwrap();

        let mut store = TrackStore::default();
        let keep = store.add_track("Keep", Some(tone(10)));
        let before = store.project_state().clone();

        let err = load_project_dir(dir.path(), &mut store, &WavCodec).unwrap_err();
        assert_eq!(err.error_code(), "CORRUPT_PROJECT");
        assert_eq!(store.project_state(), &before);
        assert_eq!(store.current_track(), Some(keep));
    }

    #[test]
    fn test_unreadable_document_is_corrupt() {
        let dir = tempdir().unwrap();
        fs::write(project_file_path(dir.path()), "{ not json").unwrap();
        let mut store = TrackStore::default();
        let err = load_project_dir(dir.path(), &mut store, &WavCodec).unwrap_err();
        assert_eq!(err.error_code(), "CORRUPT_PROJECT");
    }
}
