//! Domain logic: building provider payloads and delivering them

pub mod delivery;
pub mod mail;
