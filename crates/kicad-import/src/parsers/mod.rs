pub mod pcbnew;
pub mod query;
pub mod sexpr;
