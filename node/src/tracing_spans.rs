//! Span constructors for the chain's units of work, so pushes, pop-offs,
//! rescans and downloads carry the same names and fields everywhere.

use tracing::{info_span, Span};
use xel_types::BlockId;

pub fn push_block_span(block: BlockId, height: u32) -> Span {
    info_span!("push_block", block = %block, height)
}

pub fn pop_off_span(from_height: u32, to_height: u32) -> Span {
    info_span!("pop_off", from_height, to_height)
}

pub fn rescan_span(height: u32, validate: bool) -> Span {
    info_span!("rescan", height, validate)
}

pub fn download_span(peer: &str) -> Span {
    info_span!("download", peer = %peer)
}

pub fn fork_span(common_height: u32, fork_len: usize) -> Span {
    info_span!("process_fork", common_height, fork_len)
}

pub fn generate_span(generator: &str) -> Span {
    info_span!("generate_block", generator = %generator)
}
