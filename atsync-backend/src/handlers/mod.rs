pub mod imports;
pub mod syncs;

pub mod utils;
