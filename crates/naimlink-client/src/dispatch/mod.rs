pub mod dispatcher;

pub use dispatcher::{Dispatcher, NvmHandler, OuterHandler};
