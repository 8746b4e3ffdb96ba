pub mod client;
pub mod context;
pub mod login;
pub mod output;
pub mod resource;
pub mod root;
pub mod watch;
pub mod workflow;
