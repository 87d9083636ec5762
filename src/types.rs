pub mod advice;
pub mod event;
pub mod inbox;
pub mod push;
pub mod user;
