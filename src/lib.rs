pub mod server;

pub mod db;
pub mod heroku;
pub mod monitoring;
pub mod web;

pub mod alerting;
pub mod notifications;
pub mod version;

#[cfg(test)]
pub(crate) mod test_support;
