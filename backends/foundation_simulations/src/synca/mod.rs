mod fork;
mod semaphore;
mod signals;

pub use fork::*;
pub use semaphore::*;
pub use signals::*;
