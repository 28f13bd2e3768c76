mod handlers;
mod server;


pub use server::{StatusServer, StatusState};
