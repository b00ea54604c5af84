//! Placeholder occurrence indexing.
//!
//! Capture-group identifiers must be unique within a compiled expression,
//! but a template may repeat a placeholder (`{side}-…-{side}`). Each
//! occurrence therefore gets a fixed-width numeric suffix while the
//! expression is built (`side000`, `side001`) and loses it again before
//! results are reported. Because the suffix width is fixed, stripping is
//! exact even for placeholder names that themselves end in digits.
//!
//! Reported keys for repeated placeholders carry a clean 1-based counter
//! instead (`side1`, `side2`), which is also the keyword form accepted by
//! the solver.

/// Width of the synthetic capture-group suffix.
const SUFFIX_WIDTH: usize = 3;

/// Synthetic capture-group name for the `occurrence`-th appearance
/// (0-based) of `name`.
pub(crate) fn attach(name: &str, occurrence: usize) -> String {
    format!("{name}{occurrence:0width$}", width = SUFFIX_WIDTH)
}

/// Split a synthetic group name back into the placeholder name and its
/// 0-based occurrence.
pub(crate) fn strip(group: &str) -> (&str, usize) {
    if group.len() <= SUFFIX_WIDTH {
        return (group, 0);
    }
    let (name, digits) = group.split_at(group.len() - SUFFIX_WIDTH);
    (name, digits.parse().unwrap_or(0))
}

/// The key under which a captured occurrence is reported: the bare name,
/// or `name1..nameK` when the placeholder repeats in the pattern.
pub(crate) fn result_key(name: &str, occurrence: usize, repeated: bool) -> String {
    if repeated { format!("{name}{}", occurrence + 1) } else { name.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_strip_round_trip() {
        for (name, occurrence) in [("side", 0), ("side", 2), ("whatAffects", 11), ("x", 999)] {
            let group = attach(name, occurrence);
            assert_eq!(strip(&group), (name, occurrence));
        }
    }

    #[test]
    fn names_ending_in_digits_survive() {
        let group = attach("digits", 0);
        assert_eq!(group, "digits000");
        assert_eq!(strip(&group), ("digits", 0));
        let group = attach("pass2", 1);
        assert_eq!(strip(&group), ("pass2", 1));
    }

    #[test]
    fn result_keys_use_one_based_counters() {
        assert_eq!(result_key("side", 0, true), "side1");
        assert_eq!(result_key("side", 2, true), "side3");
        assert_eq!(result_key("category", 0, false), "category");
    }
}
