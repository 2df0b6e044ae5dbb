/// Analysis engine: the pieces each command is assembled from
pub mod dates;
pub mod fallback;
pub mod formula;
pub mod geometry;
pub mod quality;
