use std::path::PathBuf;

use crate::error::Error;
use crate::script::EffectKind;

use super::clip::Clip;

pub const DEFAULT_EFFECTS_DIR: &str = "audio";

/// Pre-recorded sound effects addressed by [`EffectKind`].
#[derive(Debug, Clone)]
pub struct EffectLibrary {
    dir: PathBuf,
}

impl EffectLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn file_name(kind: EffectKind) -> &'static str {
        match kind {
            EffectKind::Ringback | EffectKind::Transfer => "ringback.wav",
            EffectKind::Backend => "backend.wav",
            EffectKind::Sendmail => "swoosh.wav",
            EffectKind::Text => "text-received.wav",
        }
    }

    pub fn path_for(&self, kind: EffectKind) -> PathBuf {
        self.dir.join(Self::file_name(kind))
    }

    pub fn load(&self, kind: EffectKind) -> Result<Clip, Error> {
        let path = self.path_for(kind);
        if !path.is_file() {
            return Err(Error::MissingEffectAsset { kind, path });
        }

        tracing::debug!(kind = %kind, path = %path.display(), "loading effect");
        Clip::read(&path).map_err(|source| Error::EffectAsset { path, source })
    }

    /// Fails on the first kind whose asset file is absent.
    pub fn ensure_available(
        &self,
        kinds: impl IntoIterator<Item = EffectKind>,
    ) -> Result<(), Error> {
        for kind in kinds {
            let path = self.path_for(kind);
            if !path.is_file() {
                return Err(Error::MissingEffectAsset { kind, path });
            }
        }
        Ok(())
    }
}
