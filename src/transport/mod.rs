pub mod memory;
pub mod packet;
pub mod traits;

pub use memory::*;
pub use packet::*;
pub use traits::*;
