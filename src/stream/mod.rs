//! Reassembly of streamed replies.

pub mod reassembler;

pub use reassembler::StreamReassembler;
