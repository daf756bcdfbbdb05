mod geocode;

pub use geocode::*;
