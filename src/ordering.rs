use crate::models::post::Post;

/// Total order over the feed: pinned posts first, then descending creation
/// time within each partition.
///
/// The sort is stable, so posts with identical pinned state and timestamp
/// keep their input order, which also makes the function idempotent.
pub fn order_posts(mut posts: Vec<Post>) -> Vec<Post> {
    posts.sort_by(|a, b| {
        b.is_pinned
            .cmp(&a.is_pinned)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    posts
}
