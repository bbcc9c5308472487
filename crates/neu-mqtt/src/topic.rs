//! MQTT topic name/filter validation and matching (§4.4's topic filter
//! semantics, enforced exactly as the wire standard defines it).

/// A topic *name* (as carried on a `PUBLISH`) must not contain wildcards.
pub fn is_valid_topic_name(topic: &str) -> bool {
    !topic.is_empty() && !topic.contains(['#', '+'])
}

/// A topic *filter* (as carried on a `SUBSCRIBE`) may contain `#`/`+`, but
/// only in the positions the standard allows: `#` must be the final level
/// and alone within it; `+` must be alone within its level.
pub fn is_valid_topic_filter(filter: &str) -> bool {
    if filter.is_empty() {
        return false;
    }
    let levels: Vec<&str> = filter.split('/').collect();
    for (i, level) in levels.iter().enumerate() {
        if level.contains('#') && *level != "#" {
            return false;
        }
        if *level == "#" && i != levels.len() - 1 {
            return false;
        }
        if level.contains('+') && *level != "+" {
            return false;
        }
    }
    true
}

/// Match a topic name against a filter per the MQTT conformance rules.
/// Assumes `filter` already passed [`is_valid_topic_filter`] and `topic`
/// already passed [`is_valid_topic_name`]; a malformed filter matches
/// nothing rather than panicking.
pub fn topic_filter_is_match(filter: &str, topic: &str) -> bool {
    if !is_valid_topic_filter(filter) {
        return false;
    }
    // Topics beginning with `$` (e.g. broker-internal `$SYS/...`) are never
    // matched by a filter whose first level is a wildcard.
    if topic.starts_with('$') {
        let first = filter.split('/').next().unwrap_or("");
        if first == "#" || first == "+" {
            return false;
        }
    }

    let mut f = filter.split('/');
    let mut t = topic.split('/');
    loop {
        match (f.next(), t.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some("+"), None) => return false,
            (Some(fl), Some(tl)) if fl == tl => continue,
            (Some(_), _) => return false,
            (None, None) => return true,
            (None, Some(_)) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        assert!(topic_filter_is_match("a/b/c", "a/b/c"));
        assert!(!topic_filter_is_match("a/b/c", "a/b"));
        assert!(!topic_filter_is_match("a/b/c", "a/b/c/d"));
    }

    #[test]
    fn plus_matches_one_level() {
        assert!(topic_filter_is_match("a/+/c", "a/b/c"));
        assert!(!topic_filter_is_match("a/+/c", "a/b/x/c"));
        assert!(!topic_filter_is_match("sport/+", "sport"));
        assert!(topic_filter_is_match("sport/+", "sport/tennis"));
    }

    #[test]
    fn hash_matches_zero_or_more_levels() {
        assert!(topic_filter_is_match("sport/tennis/#", "sport/tennis"));
        assert!(topic_filter_is_match("sport/tennis/#", "sport/tennis/player1"));
        assert!(topic_filter_is_match("sport/tennis/#", "sport/tennis/player1/ranking"));
        assert!(topic_filter_is_match("#", "a/b/c"));
    }

    #[test]
    fn dollar_topics_excluded_from_root_wildcards() {
        assert!(!topic_filter_is_match("#", "$SYS/broker/load"));
        assert!(!topic_filter_is_match("+/monitor/Clients", "$SYS/monitor/Clients"));
        assert!(topic_filter_is_match("$SYS/#", "$SYS/broker/load"));
    }

    #[test]
    fn invalid_filters_never_match() {
        assert!(!is_valid_topic_filter(""));
        assert!(!is_valid_topic_filter("a/#/c"));
        assert!(!is_valid_topic_filter("a/b#"));
        assert!(!is_valid_topic_filter("a/b+"));
        assert!(!topic_filter_is_match("a/b#", "a/b"));
    }

    #[test]
    fn topic_names_reject_wildcards() {
        assert!(is_valid_topic_name("a/b/c"));
        assert!(!is_valid_topic_name("a/+/c"));
        assert!(!is_valid_topic_name("a/#"));
        assert!(!is_valid_topic_name(""));
    }
}
