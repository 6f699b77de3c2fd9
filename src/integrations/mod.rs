//! External service integrations.

pub mod gateway_client {
    pub use crate::gateway_client::*;
}

pub mod geocoding {
    pub use crate::geocoding::*;
}

pub mod lookup_models {
    pub use crate::lookup_models::*;
}
