// Domain-layer modules and shared errors/models
pub mod enrichment {
    pub use crate::enrichment::*;
}

pub mod extraction {
    pub use crate::extraction::*;
}

pub mod location {
    pub use crate::location::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
