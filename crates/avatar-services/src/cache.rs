use std::collections::HashMap;

use avatar_core::{SizeVariant, UserId};

/// Resolved avatar URLs of one request.
///
/// An empty string is a cached "no avatar". Owned by a single session, so it
/// never outlives the request that filled it; the session drops a user's
/// entries whenever it deletes or regenerates that user's avatar.
#[derive(Debug, Default)]
pub struct AvatarUrlCache {
    entries: HashMap<(UserId, SizeVariant), String>,
}

impl AvatarUrlCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user: UserId, variant: SizeVariant) -> Option<&str> {
        self.entries.get(&(user, variant)).map(String::as_str)
    }

    pub fn insert(&mut self, user: UserId, variant: SizeVariant, url: String) {
        self.entries.insert((user, variant), url);
    }

    pub fn invalidate_user(&mut self, user: UserId) {
        for variant in SizeVariant::ALL {
            self.entries.remove(&(user, variant));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidate_user_only_touches_that_user() {
        let mut cache = AvatarUrlCache::new();
        cache.insert(UserId(1), SizeVariant::Full, "a".to_string());
        cache.insert(UserId(1), SizeVariant::Thumb, String::new());
        cache.insert(UserId(2), SizeVariant::Full, "b".to_string());

        cache.invalidate_user(UserId(1));

        assert!(cache.get(UserId(1), SizeVariant::Full).is_none());
        assert!(cache.get(UserId(1), SizeVariant::Thumb).is_none());
        assert_eq!(cache.get(UserId(2), SizeVariant::Full), Some("b"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_empty_url_is_a_cached_value() {
        let mut cache = AvatarUrlCache::new();
        assert!(cache.is_empty());
        cache.insert(UserId(3), SizeVariant::Full, String::new());
        assert_eq!(cache.get(UserId(3), SizeVariant::Full), Some(""));
    }
}
