use gallery_model::{Role, User};
use regex::RegexSet;

use super::FilterKind;

#[derive(Debug, Clone)]
enum Matcher {
    Anchored(RegexSet),
    Exact,
}

/// Username patterns, each matched against the whole username.
#[derive(Debug, Clone)]
pub struct UsernamePatterns {
    raw: Vec<String>,
    matcher: Matcher,
}

impl UsernamePatterns {
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let raw: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let set = RegexSet::new(raw.iter().map(|p| format!("^(?:{p})$")))?;
        Ok(Self {
            raw,
            matcher: Matcher::Anchored(set),
        })
    }

    /// Literal usernames compared by equality; nothing is a metacharacter.
    pub fn exact<I, S>(usernames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            raw: usernames.into_iter().map(Into::into).collect(),
            matcher: Matcher::Exact,
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.raw
    }

    pub fn is_match(&self, username: &str) -> bool {
        match &self.matcher {
            Matcher::Anchored(set) => set.is_match(username),
            Matcher::Exact => self.raw.iter().any(|name| name == username),
        }
    }
}

/// Typed predicate over a user as returned by the identity provider.
#[derive(Debug, Clone)]
pub enum UserFilter {
    UsernameMatches(UsernamePatterns),
    UsernameNotMatches(UsernamePatterns),
    RoleIn(Vec<Role>),
    CanShare(bool),
}

impl UserFilter {
    /// Exact username match.
    pub fn username(username: &str) -> Self {
        UserFilter::UsernameMatches(UsernamePatterns::exact([username]))
    }

    pub fn not_username(username: &str) -> Self {
        UserFilter::UsernameNotMatches(UsernamePatterns::exact([username]))
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            UserFilter::UsernameMatches(_) => FilterKind::ByUsername,
            UserFilter::UsernameNotMatches(_) => FilterKind::NotByUsername,
            UserFilter::RoleIn(_) => FilterKind::ByRole,
            UserFilter::CanShare(_) => FilterKind::ByCanShare,
        }
    }

    pub fn matches(&self, user: &User) -> bool {
        match self {
            UserFilter::UsernameMatches(patterns) => {
                patterns.is_match(&user.username)
            }
            UserFilter::UsernameNotMatches(patterns) => {
                !patterns.is_match(&user.username)
            }
            UserFilter::RoleIn(roles) => roles.contains(&user.role),
            UserFilter::CanShare(flag) => user.can_share == *flag,
        }
    }
}

/// Conjunction of user predicates.
#[derive(Debug, Clone, Default)]
pub struct UserFilters(Vec<UserFilter>);

impl UserFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: UserFilter) -> Self {
        self.0.push(filter);
        self
    }

    pub fn push(&mut self, filter: UserFilter) {
        self.0.push(filter);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, user: &User) -> bool {
        self.0.iter().all(|filter| filter.matches(user))
    }

    pub fn apply(&self, users: Vec<User>) -> Vec<User> {
        users.into_iter().filter(|user| self.matches(user)).collect()
    }
}

impl FromIterator<UserFilter> for UserFilters {
    fn from_iter<T: IntoIterator<Item = UserFilter>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Vec<User> {
        vec![
            User::new("1", "alice").with_role(Role::Admin).with_can_share(true),
            User::new("2", "bob").with_can_share(true),
            User::new("3", "bobby").with_role(Role::Editor),
        ]
    }

    #[test]
    fn username_patterns_match_whole_name() {
        let patterns = UsernamePatterns::new(["bob"]).unwrap();
        assert!(patterns.is_match("bob"));
        assert!(!patterns.is_match("bobby"));

        let prefix = UsernamePatterns::new(["bob.*"]).unwrap();
        assert!(prefix.is_match("bobby"));
    }

    #[test]
    fn exclude_self_and_keep_sharers() {
        let filters = UserFilters::new()
            .with(UserFilter::not_username("alice"))
            .with(UserFilter::CanShare(true));
        let names: Vec<_> = filters
            .apply(users())
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["bob"]);
    }

    #[test]
    fn role_filter() {
        let filter = UserFilter::RoleIn(vec![Role::Admin, Role::Editor]);
        let ids: Vec<_> = users()
            .into_iter()
            .filter(|u| filter.matches(u))
            .map(|u| u.id)
            .collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn literal_username_ignores_metacharacters() {
        let filter = UserFilter::username("a.b");
        assert!(filter.matches(&User::new("x", "a.b")));
        assert!(!filter.matches(&User::new("y", "axb")));

        let long = "(".repeat(20_000);
        let filter = UserFilter::not_username(&long);
        assert!(filter.matches(&User::new("z", "bob")));
        assert!(!filter.matches(&User::new("w", &long)));
        match &filter {
            UserFilter::UsernameNotMatches(patterns) => {
                assert_eq!(patterns.patterns(), [long.as_str()]);
            }
            other => panic!("unexpected filter {other:?}"),
        }
    }
}
