//! Tour stop types
//!
//! Only audio stops take part in playback and navigation. The other kinds are
//! display content the feed renders between narrations.

use super::ids::StopId;
use serde::{Deserialize, Serialize};

/// One entry of a tour, discriminated by its `type` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Stop {
    /// Narrated stop with an audio file
    Audio(AudioStop),

    /// Swipeable set of images
    ImageGallery(GalleryStop),

    /// Pull quote
    Quote(QuoteStop),

    /// Free text card
    Text(TextStop),

    /// Point of interest without narration
    Poi(PoiStop),
}

/// Discriminant of a [`Stop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopKind {
    Audio,
    ImageGallery,
    Quote,
    Text,
    Poi,
}

impl StopKind {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::ImageGallery => "image-gallery",
            Self::Quote => "quote",
            Self::Text => "text",
            Self::Poi => "poi",
        }
    }
}

impl std::fmt::Display for StopKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Narrated stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioStop {
    /// Unique within the tour
    pub id: StopId,

    /// Stop title
    pub title: String,

    /// Resolvable media URL for the narration
    pub audio_file: String,

    /// Duration hint in seconds
    ///
    /// The duration reported by the media element once metadata loads is
    /// authoritative and replaces this value for progress weighting.
    #[serde(default)]
    pub duration: Option<f64>,

    /// Narration transcript
    #[serde(default)]
    pub transcription: Option<String>,

    /// Cover image URL
    #[serde(default)]
    pub image: Option<String>,

    /// Caption shown under the cover image
    #[serde(default)]
    pub image_caption: Option<String>,
}

/// Image inside a gallery stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryImage {
    pub url: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryStop {
    pub id: StopId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub images: Vec<GalleryImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteStop {
    pub id: StopId,
    pub quote: String,
    #[serde(default)]
    pub author: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStop {
    pub id: StopId,
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiStop {
    pub id: StopId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl Stop {
    /// Stop identifier regardless of kind
    pub fn id(&self) -> &StopId {
        match self {
            Self::Audio(s) => &s.id,
            Self::ImageGallery(s) => &s.id,
            Self::Quote(s) => &s.id,
            Self::Text(s) => &s.id,
            Self::Poi(s) => &s.id,
        }
    }

    pub fn kind(&self) -> StopKind {
        match self {
            Self::Audio(_) => StopKind::Audio,
            Self::ImageGallery(_) => StopKind::ImageGallery,
            Self::Quote(_) => StopKind::Quote,
            Self::Text(_) => StopKind::Text,
            Self::Poi(_) => StopKind::Poi,
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Audio(_))
    }

    /// Audio payload if this is an audio stop
    pub fn as_audio(&self) -> Option<&AudioStop> {
        match self {
            Self::Audio(s) => Some(s),
            _ => None,
        }
    }

    /// Cover image for stops that carry one (audio and poi)
    pub fn image(&self) -> Option<&str> {
        match self {
            Self::Audio(s) => s.image.as_deref(),
            Self::Poi(s) => s.image.as_deref(),
            _ => None,
        }
    }
}
