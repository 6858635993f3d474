#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

pub use xps_reflect as reflect;
pub use xps_serializer as serializer;
pub use xps_task as task;
pub use xps_utils as utils;
