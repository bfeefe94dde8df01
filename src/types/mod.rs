mod endpoint;
mod status;
mod transition;

pub use endpoint::*;
pub use status::*;
pub use transition::*;
