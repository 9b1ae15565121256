mod backend;
mod migration;
mod schema;
mod statement;

pub use backend::*;
pub use migration::*;
pub use schema::*;
pub use statement::*;
