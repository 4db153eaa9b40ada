pub mod commands;
pub mod media;
pub mod session;
pub mod signals;

pub use commands::*;
pub use media::*;
pub use session::*;
pub use signals::*;
