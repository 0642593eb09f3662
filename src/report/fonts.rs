//! TrueType fonts for PDF lines Helvetica cannot encode.
//!
//! Helvetica draws WinAnsi (Latin-1 and a few typographic marks). Any
//! other line is set in the first face with a glyph for every character:
//! the `PDF_FONT_PATH` font when configured, then bundled DejaVu Sans
//! (Latin Extended, Greek, Cyrillic, Arabic, Hebrew), then bundled
//! Unifont CJK (Han, kana, Hangul). Arabic is drawn unshaped.

use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use printpdf::lopdf;
use thiserror::Error;
use ttf_parser::Face;

pub(crate) const DEJAVU_SANS: &[u8] = include_bytes!("../../resources/fonts/DejaVuSans.ttf");
pub(crate) const UNIFONT_CJK: &[u8] = include_bytes!("../../resources/fonts/UnifontCJK.ttf");

#[derive(Error, Debug)]
pub enum FontError {
    #[error("Cannot read font {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a TrueType font: {path}")]
    Parse { path: String },
}

#[derive(Clone)]
pub struct FontFace {
    name: Cow<'static, str>,
    data: Cow<'static, [u8]>,
}

impl FontFace {
    fn bundled(name: &'static str, data: &'static [u8]) -> Self {
        Self {
            name: Cow::Borrowed(name),
            data: Cow::Borrowed(data),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of characters in `text` without a glyph in this face.
    pub fn missing(&self, text: &str) -> usize {
        match Face::parse(&self.data, 0) {
            Ok(face) => text.chars().filter(|c| face.glyph_index(*c).is_none()).count(),
            Err(_) => text.chars().count(),
        }
    }
}

/// Ordered fallback faces, cheap to clone.
#[derive(Clone)]
pub struct FontBook {
    faces: Arc<Vec<FontFace>>,
}

impl Default for FontBook {
    /// The bundled faces only.
    fn default() -> Self {
        Self {
            faces: Arc::new(bundled()),
        }
    }
}

impl fmt::Debug for FontBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

fn bundled() -> Vec<FontFace> {
    vec![
        FontFace::bundled("DejaVu Sans", DEJAVU_SANS),
        FontFace::bundled("Unifont CJK", UNIFONT_CJK),
    ]
}

impl FontBook {
    /// Bundled faces, preceded by the TrueType file at `custom` if given.
    pub fn load(custom: Option<&Path>) -> Result<Self, FontError> {
        let mut faces = Vec::new();
        if let Some(path) = custom {
            let data = std::fs::read(path).map_err(|source| FontError::Io {
                path: path.display().to_string(),
                source,
            })?;
            if Face::parse(&data, 0).is_err() {
                return Err(FontError::Parse {
                    path: path.display().to_string(),
                });
            }
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            faces.push(FontFace {
                name: Cow::Owned(name),
                data: Cow::Owned(data),
            });
        }
        faces.extend(bundled());
        Ok(Self {
            faces: Arc::new(faces),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.faces.iter().map(FontFace::name)
    }

    pub fn face(&self, index: usize) -> Option<&FontFace> {
        self.faces.get(index)
    }

    /// Index of the face to set `text` in: the first that covers every
    /// character, otherwise the one missing the fewest.
    pub fn pick(&self, text: &str) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for (index, face) in self.faces.iter().enumerate() {
            let missing = face.missing(text);
            if missing == 0 {
                return Some(index);
            }
            if best.map_or(true, |(_, fewest)| missing < fewest) {
                best = Some((index, missing));
            }
        }
        if let Some((index, missing)) = best {
            tracing::warn!(
                missing,
                font = self.faces[index].name(),
                "PDF line has characters no font can draw"
            );
        }
        best.map(|(index, _)| index)
    }
}

/// Whether every character of `text` has a WinAnsi code, i.e. Helvetica
/// can draw it.
pub fn is_winansi(text: &str) -> bool {
    lopdf::Document::encode_text(Some("WinAnsiEncoding"), text).len() == text.encode_utf16().count()
}
