pub mod status;
pub mod update;
pub mod verify;
