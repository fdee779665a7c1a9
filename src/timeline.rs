// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Timeline - ordered change events driving propagation newest-first

use crate::component::Component;
use crate::ordered_map::OrderedMap;
use crate::variables::Variable;
use chrono::{DateTime, FixedOffset};
use std::cmp::Ordering;

/// Sort direction for [`Timeline::sort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest first.
    Asc,
    /// Newest first.
    Desc,
}

/// A set of components whose version changed in one commit.
#[derive(Debug, Clone)]
pub struct ComponentsItem {
    version: String,
    commit: String,
    date: DateTime<FixedOffset>,
    components: OrderedMap<Component>,
}

impl ComponentsItem {
    /// Create an item with an empty member set.
    pub fn new(
        version: impl Into<String>,
        commit: impl Into<String>,
        date: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            version: version.into(),
            commit: commit.into(),
            date,
            components: OrderedMap::new(),
        }
    }

    /// Add a member component, keyed by name.
    pub fn add_component(&mut self, component: Component) {
        self.components.set(component.name().to_string(), component);
    }

    /// Member components.
    #[must_use]
    pub fn components(&self) -> &OrderedMap<Component> {
        &self.components
    }
}

/// A set of variables whose value changed in one commit.
#[derive(Debug, Clone)]
pub struct VariablesItem {
    version: String,
    commit: String,
    date: DateTime<FixedOffset>,
    variables: OrderedMap<Variable>,
}

impl VariablesItem {
    /// Create an item with an empty member set.
    pub fn new(
        version: impl Into<String>,
        commit: impl Into<String>,
        date: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            version: version.into(),
            commit: commit.into(),
            date,
            variables: OrderedMap::new(),
        }
    }

    /// Add a member variable, keyed by name.
    pub fn add_variable(&mut self, variable: Variable) {
        self.variables.set(variable.name().to_string(), variable);
    }

    /// Member variables.
    #[must_use]
    pub fn variables(&self) -> &OrderedMap<Variable> {
        &self.variables
    }
}

/// A change event: either components or variables changed at a commit.
#[derive(Debug, Clone)]
pub enum TimelineItem {
    /// Component version changes.
    Components(ComponentsItem),
    /// Variable value changes.
    Variables(VariablesItem),
}

impl TimelineItem {
    /// The version to propagate to dependents.
    #[must_use]
    pub fn version(&self) -> &str {
        match self {
            Self::Components(i) => &i.version,
            Self::Variables(i) => &i.version,
        }
    }

    /// The anchoring commit hash.
    #[must_use]
    pub fn commit(&self) -> &str {
        match self {
            Self::Components(i) => &i.commit,
            Self::Variables(i) => &i.commit,
        }
    }

    /// The anchoring commit's author date.
    #[must_use]
    pub fn date(&self) -> DateTime<FixedOffset> {
        match self {
            Self::Components(i) => i.date,
            Self::Variables(i) => i.date,
        }
    }

    /// Union the other item's members into this one; existing keys win.
    /// Mismatched variants are ignored.
    pub fn merge(&mut self, other: &TimelineItem) {
        match (self, other) {
            (Self::Components(a), Self::Components(b)) => {
                for key in b.components.keys() {
                    if a.components.contains_key(&key) {
                        continue;
                    }
                    if let Some(component) = b.components.get(&key) {
                        a.components.set(key, component.clone());
                    }
                }
            }
            (Self::Variables(a), Self::Variables(b)) => {
                for key in b.variables.keys() {
                    if a.variables.contains_key(&key) {
                        continue;
                    }
                    if let Some(variable) = b.variables.get(&key) {
                        a.variables.set(key, variable.clone());
                    }
                }
            }
            _ => {}
        }
    }

    fn same_identity(&self, other: &TimelineItem) -> bool {
        let same_variant = matches!(
            (self, other),
            (Self::Components(_), Self::Components(_)) | (Self::Variables(_), Self::Variables(_))
        );
        same_variant && self.version() == other.version() && self.date() == other.date()
    }

    // Variables sort before components in ascending order.
    fn variant_rank(&self) -> u8 {
        match self {
            Self::Variables(_) => 0,
            Self::Components(_) => 1,
        }
    }
}

/// Ordered multiset of change events with merge-by-identity insertion.
#[derive(Debug, Default)]
pub struct Timeline {
    items: Vec<TimelineItem>,
}

impl Timeline {
    /// Create an empty timeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item. An existing item of the same variant with equal
    /// `(version, date)` absorbs the new members instead (first wins on
    /// member collision).
    pub fn add(&mut self, item: TimelineItem) {
        for existing in &mut self.items {
            if existing.same_identity(&item) {
                existing.merge(&item);
                return;
            }
        }
        self.items.push(item);
    }

    /// Sort strictly by date; date ties are broken by variant (variables
    /// first ascending, components first descending), further ties keep
    /// insertion order.
    pub fn sort(&mut self, order: SortOrder) {
        self.items.sort_by(|a, b| {
            let by_date = match order {
                SortOrder::Asc => a.date().cmp(&b.date()),
                SortOrder::Desc => b.date().cmp(&a.date()),
            };
            if by_date != Ordering::Equal {
                return by_date;
            }
            match order {
                SortOrder::Asc => a.variant_rank().cmp(&b.variant_rank()),
                SortOrder::Desc => b.variant_rank().cmp(&a.variant_rank()),
            }
        });
    }

    /// Items in current order.
    pub fn iter(&self) -> impl Iterator<Item = &TimelineItem> {
        self.items.iter()
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the timeline holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(secs: i64) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0).unwrap().timestamp_opt(secs, 0).unwrap()
    }

    fn components_item(version: &str, secs: i64, members: &[&str]) -> TimelineItem {
        let mut item = ComponentsItem::new(version, format!("{version}{version}"), date(secs));
        for name in members {
            item.add_component(Component::new(name, "/src").unwrap());
        }
        TimelineItem::Components(item)
    }

    fn variables_item(version: &str, secs: i64, members: &[&str]) -> TimelineItem {
        let mut item = VariablesItem::new(version, format!("{version}{version}"), date(secs));
        for name in members {
            item.add_variable(Variable::new(*name, "l", "l/group_vars/all/vars.yaml", "h", false));
        }
        TimelineItem::Variables(item)
    }

    #[test]
    fn add_merges_on_version_and_date() {
        let mut timeline = Timeline::new();
        timeline.add(components_item("v1", 100, &["l.k.a"]));
        timeline.add(components_item("v1", 100, &["l.k.b"]));
        assert_eq!(timeline.len(), 1);

        let TimelineItem::Components(item) = timeline.iter().next().unwrap() else {
            panic!("expected components item");
        };
        assert_eq!(item.components().len(), 2);
    }

    #[test]
    fn add_does_not_merge_across_variants() {
        let mut timeline = Timeline::new();
        timeline.add(components_item("v1", 100, &["l.k.a"]));
        timeline.add(variables_item("v1", 100, &["var_a"]));
        assert_eq!(timeline.len(), 2);
    }

    #[test]
    fn add_does_not_merge_different_dates() {
        let mut timeline = Timeline::new();
        timeline.add(components_item("v1", 100, &["l.k.a"]));
        timeline.add(components_item("v1", 200, &["l.k.b"]));
        assert_eq!(timeline.len(), 2);
    }

    #[test]
    fn merge_keeps_existing_members_on_collision() {
        let mut first = ComponentsItem::new("v1", "c1", date(100));
        first.add_component(Component::new("l.services.a", "/first").unwrap());
        let mut second = ComponentsItem::new("v1", "c2", date(100));
        second.add_component(Component::new("l.services.a", "/second").unwrap());

        let mut timeline = Timeline::new();
        timeline.add(TimelineItem::Components(first));
        timeline.add(TimelineItem::Components(second));

        let TimelineItem::Components(item) = timeline.iter().next().unwrap() else {
            panic!("expected components item");
        };
        let kept = item.components().get("l.services.a").unwrap();
        assert_eq!(kept.path_prefix(), std::path::Path::new("/first"));
    }

    #[test]
    fn sort_desc_is_newest_first() {
        let mut timeline = Timeline::new();
        timeline.add(components_item("old", 100, &["l.k.a"]));
        timeline.add(components_item("new", 300, &["l.k.b"]));
        timeline.add(components_item("mid", 200, &["l.k.c"]));

        timeline.sort(SortOrder::Desc);
        let versions: Vec<_> = timeline.iter().map(TimelineItem::version).collect();
        assert_eq!(versions, ["new", "mid", "old"]);
    }

    #[test]
    fn sort_tie_policy_by_variant() {
        let mut timeline = Timeline::new();
        timeline.add(components_item("c", 100, &["l.k.a"]));
        timeline.add(variables_item("v", 100, &["var_a"]));

        timeline.sort(SortOrder::Asc);
        assert!(matches!(timeline.iter().next(), Some(TimelineItem::Variables(_))));

        timeline.sort(SortOrder::Desc);
        assert!(matches!(timeline.iter().next(), Some(TimelineItem::Components(_))));
    }
}
