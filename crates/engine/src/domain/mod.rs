#![forbid(unsafe_code)]

mod attr;
mod batch;
mod meta;
mod result;

pub use attr::Attr;
pub use batch::{Batch, Errs};
pub use meta::{Hit, Meta, REMOTE_SCHEME, Status};
pub use result::{Report, ResultView, ScanResult, group};
