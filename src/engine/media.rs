use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

/// Container type written by the webcam recorder.
pub const RECORDING_MIME: &str = "video/webm";
/// Display name given to every recorded artifact.
pub const RECORDING_NAME: &str = "recorded_video.webm";

const FALLBACK_MIME: &str = "application/octet-stream";

static NEXT_ARTIFACT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a media artifact. Two artifacts built from the
/// same bytes still get different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtifactId(u64);

impl ArtifactId {
    fn next() -> Self {
        Self(NEXT_ARTIFACT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "artifact-{}", self.0)
    }
}

/// Where an artifact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    UserFile,
    Recording,
}

/// An immutable video blob ready to be previewed and uploaded.
#[derive(Debug, Clone)]
pub struct MediaArtifact {
    id: ArtifactId,
    name: String,
    mime: String,
    bytes: Bytes,
    provenance: Provenance,
}

impl MediaArtifact {
    /// Wrap the contents of a file the user picked.
    pub fn from_file(name: impl Into<String>, mime: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            id: ArtifactId::next(),
            name: name.into(),
            mime: mime.into(),
            bytes,
            provenance: Provenance::UserFile,
        }
    }

    /// Join recorded segments, in arrival order, into one artifact.
    pub fn from_segments(segments: &[Bytes]) -> Self {
        let total = segments.iter().map(Bytes::len).sum();
        let mut joined = Vec::with_capacity(total);
        for segment in segments {
            joined.extend_from_slice(segment);
        }
        Self {
            id: ArtifactId::next(),
            name: RECORDING_NAME.to_string(),
            mime: RECORDING_MIME.to_string(),
            bytes: Bytes::from(joined),
            provenance: Provenance::Recording,
        }
    }

    pub fn id(&self) -> ArtifactId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Guess a video MIME type from a file name's extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        _ => FALLBACK_MIME,
    }
}
