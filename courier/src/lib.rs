pub mod controller;
mod maintenance;

pub use controller::{Courier, Services};
