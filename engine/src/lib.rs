// cncd — demand-driven step/item resolution
//
// Library root. Expressions (lexer → parser → eval), the graph model and its
// loader, and the resolution engine built on top.

pub mod ast;
pub mod blame;
pub mod context;
pub mod diag;
pub mod engine;
pub mod enumerate;
pub mod env;
pub mod error;
pub mod eval;
pub mod graph;
pub mod interact;
pub mod io;
pub mod lexer;
pub mod load;
pub mod parser;
pub mod report;
pub mod resolve;
pub mod state;
pub mod tag;
