// Thin namespace wrapper for API-layer components
pub mod handlers {
    pub use crate::handlers::*;
}

pub mod funnel {
    pub use crate::funnel::*;
}
