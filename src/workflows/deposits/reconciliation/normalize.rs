/// Canonical form used on both sides of every name comparison: all
/// whitespace removed, everything else (case, punctuation, script) kept.
/// Bank remarks and registrant-entered names share the same conventions,
/// so whitespace is the only noise worth stripping.
pub fn normalize_name(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Symmetric substring containment over normalized forms. Either party may
/// have entered a shortened or suffixed variant of the other's name, so
/// containment must be checked in both directions.
pub fn names_match(remark: &str, name: &str) -> bool {
    let remark = normalize_name(remark);
    let name = normalize_name(name);
    if remark.is_empty() || name.is_empty() {
        return false;
    }
    remark.contains(&name) || name.contains(&remark)
}
