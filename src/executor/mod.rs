pub mod adb;
pub mod channel;
pub mod coordinator;
pub mod dispatcher;
pub mod keys;
pub mod screen;
pub mod text_input;

#[cfg(test)]
pub(crate) mod fake;
