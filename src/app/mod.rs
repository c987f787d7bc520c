pub mod runner;
pub mod server;

pub use runner::NerPipeline;
pub use server::{router, serve, AppState, Server};
