pub mod appfile;
pub mod meta;

pub use appfile::{AppFile, BuildSettings, CorsConfig};
pub use meta::*;
