pub mod comment;
pub mod post;
pub mod reaction;

pub use comment::{Comment, NewComment};
pub use post::{Author, EventDetails, LocationType, MediaAttachment, MediaKind, NewPost, Post, PostKind, Visibility};
pub use reaction::{EntityKind, ReactionRow, ReactionSummary, ReactionType};
