pub mod feed;
pub mod push;
pub mod state;
pub mod telegram;
pub mod time;
