mod completion_handler;
mod request_handler;
mod task_processor;

pub use completion_handler::*;
pub use request_handler::*;
pub use task_processor::*;
