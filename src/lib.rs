//! Continuous spatial-keyword query index.
//!
//! Standing range and k-NN queries, each with keywords and an expiry time, are
//! registered once into a multi-level grid whose cells hold an adaptive
//! list/trie keyword index. Every object on the stream is then matched against
//! the live queries by visiting one cell per level.
//!
//! ```rust
//! use spatio_fast::prelude::*;
//!
//! let index = FastIndex::builder()
//!     .bounds(Rectangle::new(0.0, 0.0, 10.0, 10.0))
//!     .granularity(8)
//!     .build()?;
//!
//! index.register_query(RangeQuery::new(1, ["pizza"], Rectangle::new(6.0, 0.0, 10.0, 4.0), 100))?;
//! index.register_query(KnnQuery::new(2, ["pizza", "vegan"], Point::new(1.0, 1.0), 3, 100))?;
//!
//! let hits = index.search_object(&DataObject::new(10, ["pizza", "vegan"], Point::new(7.0, 2.0)));
//! let mut ids: Vec<u64> = hits.iter().map(|q| q.id()).collect();
//! ids.sort();
//! assert_eq!(ids, vec![1, 2]);
//! # Ok::<(), spatio_fast::FastError>(())
//! ```

pub mod builder;
pub mod config;
pub mod context;
pub mod dump;
pub mod error;
pub mod grid;
pub mod index;
pub mod keywords;
pub mod knn;
pub mod object;
pub mod query;
pub mod report;
pub mod stats;
pub mod textual;

pub use builder::IndexBuilder;
pub use config::IndexConfig;
pub use context::KeywordFrequency;
pub use dump::{CellDump, IndexDump, NodeDump, NodeKind};
pub use error::{FastError, Result};
pub use index::{FastIndex, ReinsertEntry};
pub use keywords::Keywords;
pub use object::{DataObject, ObjectId};
pub use query::{ContinuousQuery, KnnQuery, QueryId, QueryRef, RangeQuery};
pub use report::RunReport;
pub use stats::IndexStats;

pub use spatio_fast_types::{Point, Rectangle};

pub mod prelude {
    //! Commonly used types.

    pub use crate::{
        DataObject, FastError, FastIndex, IndexConfig, KnnQuery, Point, QueryRef, RangeQuery,
        Rectangle, Result,
    };
}

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
