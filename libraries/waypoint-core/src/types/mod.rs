mod ids;
mod language;
mod progress;
mod stop;
mod tour;

pub use ids::{StopId, TourId};
pub use language::Language;
pub use progress::{Preferences, StopProgress};
pub use stop::{AudioStop, GalleryImage, GalleryStop, PoiStop, QuoteStop, Stop, StopKind, TextStop};
pub use tour::Tour;
