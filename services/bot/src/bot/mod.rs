pub mod admin;
pub mod handlers;
pub mod paraphrase_task;
pub mod report_task;
pub mod state;
pub mod sweep_task;
pub mod update_loop;


// Re-export the pieces the binary wires together.
pub use state::AppState;
