mod coord;
mod overpass_types;
mod poi_types;
mod repro_types;

pub use coord::*;
pub use overpass_types::*;
pub use poi_types::*;
pub use repro_types::*;
