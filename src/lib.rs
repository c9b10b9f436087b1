pub mod document;
pub mod error;
pub mod line_index;
pub mod piece;
pub mod search;
pub mod utf8;

pub use document::{Document, Snapshot};
pub use error::Error;
pub use line_index::LineIndex;
pub use piece::{Piece, PieceSource, PieceTable};
pub use search::{search, spawn_search, SearchHit};
