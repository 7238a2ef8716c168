pub mod cli;
pub mod sql;
pub mod storage;

pub use sql::executor::{execute_query, QueryError, QueryResult};
pub use storage::{Column, DataType, RawRow, Record, StoreError, Table, TableStore, Value};
