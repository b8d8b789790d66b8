pub mod ads;
pub mod context;
pub mod error;
pub mod pagination;
pub mod placement;
pub mod storage;
pub mod types;

pub use context::PageContext;
pub use error::{Error, Result};
pub use pagination::PageLinks;
pub use placement::{place, place_with, PageNumber, Placement, PlacementRules};
pub use storage::{AdQuery, NewsStorage, PostQuery};
pub use types::{
    Ad, AdPatch, Comment, NewAd, NewComment, NewPost, PageKind, Post, PostFlag, PostId, PostPatch,
    Subscriber,
};
