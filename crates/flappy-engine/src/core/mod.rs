pub use self::{agent::*, obstacle::*, rect::*};

pub(crate) mod agent;
pub(crate) mod obstacle;
pub(crate) mod rect;
