mod coordinate;

pub use coordinate::CoordinateSpecifier;

/// Default repository for libraries without explicit download metadata.
pub const LIBRARY_BASE: &str = "https://libraries.minecraft.net/";
