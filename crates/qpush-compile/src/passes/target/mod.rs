//! Target-specific passes.

mod direction;
mod layout;
mod routing;
mod translation;

pub use direction::GateDirection;
pub use layout::{DenseLayout, TrivialLayout};
pub use routing::{RoutingStats, ShortestPathRouting};
pub use translation::{BasisTranslation, Entangler};
