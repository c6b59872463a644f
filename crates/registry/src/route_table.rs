use std::sync::Arc;

use indexmap::IndexMap;

use crate::activity::ActivityDescriptor;

/// Route → activity map built at startup and read-only afterwards.
///
/// Iteration follows first-insertion order. Inserting at an existing route
/// replaces the descriptor in place (last discovery wins).
#[derive(Debug, Default, Clone)]
pub struct RouteTable {
    routes: IndexMap<String, Arc<ActivityDescriptor>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an activity, returning the descriptor it replaced.
    pub fn insert(&mut self, activity: ActivityDescriptor) -> Option<Arc<ActivityDescriptor>> {
        self.routes
            .insert(activity.route.clone(), Arc::new(activity))
    }

    pub fn get(&self, route: &str) -> Option<&Arc<ActivityDescriptor>> {
        self.routes.get(route)
    }

    /// Find the activity mounted at the first two segments of `path` and
    /// return it with the remaining path (always starting with `/`).
    pub fn resolve<'a>(&self, path: &'a str) -> Option<(&Arc<ActivityDescriptor>, &'a str)> {
        let trimmed = path.strip_prefix('/')?;
        let mut split = 0;
        let mut slashes = 0;
        for (index, ch) in trimmed.char_indices() {
            if ch == '/' {
                slashes += 1;
                if slashes == 2 {
                    split = index;
                    break;
                }
            }
        }
        let (prefix, rest) = if slashes == 2 {
            trimmed.split_at(split)
        } else {
            (trimmed, "")
        };

        let (domain, name) = prefix.split_once('/')?;
        if domain.is_empty() || name.is_empty() {
            return None;
        }
        let activity = self.routes.get(path.get(..prefix.len() + 1)?)?;
        let remainder = if rest.is_empty() { "/" } else { rest };
        Some((activity, remainder))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ActivityDescriptor>> {
        self.routes.values()
    }

    /// Activities that run on a dedicated runtime instance.
    pub fn runtime_activities(&self) -> impl Iterator<Item = &Arc<ActivityDescriptor>> {
        self.routes.values().filter(|activity| activity.has_runtime())
    }

    /// Activities grouped by domain, domains in first-seen order.
    pub fn by_domain(&self) -> IndexMap<&str, Vec<&Arc<ActivityDescriptor>>> {
        let mut grouped: IndexMap<&str, Vec<&Arc<ActivityDescriptor>>> = IndexMap::new();
        for activity in self.routes.values() {
            grouped
                .entry(activity.domain.as_str())
                .or_default()
                .push(activity);
        }
        grouped
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::FrameworkType;

    fn activity(domain: &str, name: &str, framework: FrameworkType) -> ActivityDescriptor {
        ActivityDescriptor::new(
            name,
            format!("/srv/{}/{}", domain, name),
            domain,
            framework,
            None,
        )
    }

    #[test]
    fn resolve_splits_route_and_remainder() {
        let mut table = RouteTable::new();
        table.insert(activity("a", "one", FrameworkType::Nextjs));

        let (found, rest) = table.resolve("/a/one/_next/static/chunks/x.js").expect("match");
        assert_eq!(found.route, "/a/one");
        assert_eq!(rest, "/_next/static/chunks/x.js");

        let (_, rest) = table.resolve("/a/one").expect("match");
        assert_eq!(rest, "/");
        let (_, rest) = table.resolve("/a/one/").expect("match");
        assert_eq!(rest, "/");
    }

    #[test]
    fn resolve_matches_whole_segments_only() {
        let mut table = RouteTable::new();
        table.insert(activity("a", "one", FrameworkType::Static));
        assert!(table.resolve("/a/one-two").is_none());
        assert!(table.resolve("/a").is_none());
        assert!(table.resolve("/").is_none());
        assert!(table.resolve("a/one").is_none());
    }

    #[test]
    fn later_insert_wins_but_keeps_position() {
        let mut table = RouteTable::new();
        table.insert(activity("tools", "first", FrameworkType::Static));
        table.insert(activity("tools", "dup", FrameworkType::Static));
        let replaced = table.insert(activity("tools", "dup", FrameworkType::Nextjs));

        assert_eq!(
            replaced.map(|previous| previous.framework),
            Some(FrameworkType::Static)
        );
        assert_eq!(table.len(), 2);
        let routes: Vec<_> = table.iter().map(|a| a.route.as_str()).collect();
        assert_eq!(routes, vec!["/tools/first", "/tools/dup"]);
        assert_eq!(
            table.get("/tools/dup").map(|a| a.framework),
            Some(FrameworkType::Nextjs)
        );
        assert_eq!(table.runtime_activities().count(), 1);
    }

    #[test]
    fn groups_by_domain_in_first_seen_order() {
        let mut table = RouteTable::new();
        table.insert(activity("causality", "c1", FrameworkType::Static));
        table.insert(activity("randomization", "r1", FrameworkType::Static));
        table.insert(activity("causality", "c2", FrameworkType::Static));

        let grouped = table.by_domain();
        let domains: Vec<_> = grouped.keys().copied().collect();
        assert_eq!(domains, vec!["causality", "randomization"]);
        assert_eq!(grouped["causality"].len(), 2);
    }
}
