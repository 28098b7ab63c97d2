//! External service integrations.

pub mod crm {
    pub use crate::crm::*;
}

pub mod insights {
    pub use crate::insights::*;
}
