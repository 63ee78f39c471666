/// Filesystem helpers: input opening, output creation, region file layout.
pub mod fs;
