pub mod bitstream;
pub mod huffman;

pub use huffman::{CodeNode, CodeTable, CodeTree, CODE_NODE_RECORD_SIZE};
