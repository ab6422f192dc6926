//! Common code shared between the overlay server and its detection clients.
pub mod protocol;
pub mod types;
