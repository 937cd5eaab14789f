use super::*;

pub mod digest_runs;
