pub mod audience;
pub mod dispatcher;
pub mod fanout;
pub mod food;
pub mod orchestrator;
pub mod profile;
pub mod recorder;
pub mod scheduler;
