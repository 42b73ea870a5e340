pub mod core;
pub mod index;
pub mod compression;
pub mod storage;
pub mod memory;
pub mod resolver;
pub mod writer;
pub mod dump;

pub use crate::core::config::Config;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::hash::{MurmurHash64A, StringHasher};
pub use crate::core::types::{format_hash, HashEntry, StringLocation};
pub use crate::index::HashIndex;
pub use crate::compression::CodeTree;
pub use crate::resolver::Resolver;

/*
┌──────────────────────────────────────────────────────────────────────────────┐
│                              SYMDB ARCHITECTURE                              │
└──────────────────────────────────────────────────────────────────────────────┘

  ┌──────────────── GENERATION ────────────────┐   ┌────────── RUNTIME ──────────┐
  │                                            │   │                             │
  │  LiteralScanner ──(hash, string)──┐        │   │  Resolver                   │
  │                                   ▼        │   │   ├ runtime_index: HashIndex│
  │                        DatabaseGenerator   │   │   ├ runtime_strings: Arena  │
  │                          ├ HashIndex       │   │   ├ databases: Vec<Reader>  │
  │                          ├ CodeTree (opt)  │   │   └ cache: LruCache         │
  │                          └ blob            │   │          │                  │
  └───────────────────┬────────────────────────┘   └──────────┼──────────────────┘
                      │ DatabaseHeader::encode                │ walk_files + open_if_supported
                      ▼                                       ▼
        ┌───────────────────────────── *.hdb ─────────────────────────────┐
        │ flags │ index table │ [code tree] │ blob (raw or bit stream)    │
        └─────────────────────────────────────────────────────────────────┘
                      ▲
                      │ DatabaseReader::open / for_each_string
                ┌─────┴─────┐
                │   dump    │ ── TextSink (file) / TextSink + StdinGate (paged)
                └───────────┘

  Lookup order: runtime_index → cache → databases[0] → databases[1] → ... → None
*/
