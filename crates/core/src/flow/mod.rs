mod batch;
mod outcome;
mod rename;
mod replace;
mod replace_error;
mod request;

pub use batch::*;
pub use outcome::*;
pub use replace::*;
pub use request::*;
