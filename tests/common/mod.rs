#![allow(unused_imports)]

pub use taskdag_test_utils::{builders, fakes, eventually, init_tracing, settle, with_timeout};
