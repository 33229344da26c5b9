mod outcome;
mod primitives;
mod records;

pub use outcome::*;
pub use primitives::*;
pub use records::*;
