// Domain-layer modules and shared errors/models
pub mod models {
    pub use crate::models::*;
}

pub mod questions {
    pub use crate::questions::*;
}

pub mod quiz {
    pub use crate::quiz::*;
}

pub mod scoring {
    pub use crate::scoring::*;
}

pub mod forms {
    pub use crate::forms::*;
}

pub mod guide {
    pub use crate::guide::*;
}

pub mod entry {
    pub use crate::entry::*;
}

pub mod session {
    pub use crate::session::*;
}

pub mod errors {
    pub use crate::errors::*;
}
