pub mod cli;
pub mod github;
pub mod monitor;
pub mod output;
pub mod retry;
pub mod teamcity;
