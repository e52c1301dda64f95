#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]
#![allow(non_snake_case)]

#[macro_use]
extern crate num_derive;

#[macro_use]
extern crate lazy_static;

pub mod api;
mod dec;
mod enc;

mod checksum;
mod cu;
mod def;
mod frame;
mod ipred;
mod itdq;
mod mc;
mod picman;
mod qp;
mod restrictions;
mod util;

pub use crate::checksum::{Checksum, ChecksumMethod};
pub use crate::dec::thd::ThreadDecoder;
pub use crate::dec::{OutputStatus, PictureDecoder};
pub use crate::def::pel;
pub use crate::def::SegmentHeader;
pub use crate::enc::XvceCtx;
pub use crate::frame::Frame;
pub use crate::restrictions::Restrictions;
