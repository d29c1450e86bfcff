pub mod downloads;
pub mod extract;
pub mod handlers;
pub mod pipeline;
pub mod upload;
pub mod workspace;
