//! Tool name aliases

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;

/// Aliases every server understands
static BUILTIN_ALIASES: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("think", "thinkdeep"),
        ("deepthink", "thinkdeep"),
        ("review", "codereview"),
        ("ask", "chat"),
        ("debugger", "debug"),
        ("plan", "planner"),
    ]
});

/// Upper bound on alias chain length; longer chains are treated as cycles
const MAX_CHAIN: usize = 16;

/// Alias -> canonical name table
///
/// Chains (`a -> b -> c`) are flattened when the table is built, so
/// resolving an already-canonical name is always a no-op.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    aliases: HashMap<String, String>,
}

impl AliasTable {
    /// Built-in aliases plus `extra`; `extra` wins on conflicts
    pub fn new(extra: &BTreeMap<String, String>) -> Self {
        let mut raw: HashMap<String, String> = BUILTIN_ALIASES
            .iter()
            .map(|(alias, target)| (alias.to_string(), target.to_string()))
            .collect();
        for (alias, target) in extra {
            raw.insert(normalize(alias), normalize(target));
        }
        raw.retain(|alias, target| alias != target);

        let aliases = raw
            .keys()
            .filter_map(|alias| flatten(&raw, alias).map(|target| (alias.clone(), target)))
            .collect();
        Self { aliases }
    }

    pub fn builtin() -> Self {
        Self::new(&BTreeMap::new())
    }

    /// Canonical name for `name` (trimmed and lowercased)
    pub fn resolve(&self, name: &str) -> String {
        let name = normalize(name);
        self.aliases.get(&name).cloned().unwrap_or(name)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Follow a chain to its end; `None` for cycles
fn flatten(raw: &HashMap<String, String>, alias: &str) -> Option<String> {
    let mut current = raw.get(alias)?;
    for _ in 0..MAX_CHAIN {
        match raw.get(current) {
            Some(next) if next == alias => return None,
            Some(next) => current = next,
            None => return Some(current.clone()),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_resolve() {
        let table = AliasTable::builtin();
        assert_eq!(table.resolve("think"), "thinkdeep");
        assert_eq!(table.resolve("  Review "), "codereview");
        assert_eq!(table.resolve("chat"), "chat");
        assert_eq!(table.resolve("unknown"), "unknown");
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut extra = BTreeMap::new();
        extra.insert("tdeep".to_string(), "think".to_string());
        let table = AliasTable::new(&extra);

        for name in ["think", "tdeep", "thinkdeep", "ask", "chat", "plan"] {
            let once = table.resolve(name);
            assert_eq!(table.resolve(&once), once, "{}", name);
        }
        assert_eq!(table.resolve("tdeep"), "thinkdeep");
    }

    #[test]
    fn cycles_are_dropped() {
        let mut extra = BTreeMap::new();
        extra.insert("a".to_string(), "b".to_string());
        extra.insert("b".to_string(), "a".to_string());
        let table = AliasTable::new(&extra);
        assert_eq!(table.resolve("a"), "a");
        assert_eq!(table.resolve("b"), "b");
    }
}
