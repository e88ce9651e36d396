mod accounts;
mod articles;
mod schema;
mod sync_runs;
mod types;

pub use schema::Database;
pub use sync_runs::RunCounts;
pub use types::{
    Account, Article, ArticleSort, DatabaseError, NewArticle, StoreStats, SyncKind, SyncRun,
    SyncStatus,
};
