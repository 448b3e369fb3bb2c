pub mod entity;
pub mod questions;
