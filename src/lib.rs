#[macro_use]
extern crate quick_error;

#[macro_use]
extern crate lazy_static;

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

#[macro_use]
extern crate serde_derive;
extern crate bincode;

pub mod bayer;
pub mod blit;
pub mod cga;
pub mod color;
pub mod dither;
pub mod error;
pub mod frame;
pub mod net;
pub mod output;
pub mod passes;
pub mod pixel;
pub mod process;
pub mod scan;
pub mod timing;
pub mod tools;

pub use crate::error::Error;
