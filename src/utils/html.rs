use ammonia;

/// Clean user-authored post/comment content using the ammonia library.
///
/// This employs a whitelist-based sanitization strategy: it preserves safe
/// tags (like <b>, <p>) while stripping dangerous tags (like <script>,
/// <iframe>) and malicious attributes (like onclick).
///
/// The engine applies this before the optimistic local apply as well as
/// before the remote write, so a hostile payload never reaches subscribers
/// even transiently.
pub fn clean_content(input: &str) -> String {
    ammonia::clean(input)
}
