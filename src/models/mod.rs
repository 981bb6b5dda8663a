pub mod fragment;
pub mod job;
pub mod search;
pub mod settings;
