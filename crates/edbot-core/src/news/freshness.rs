use chrono::{DateTime, Utc};

use super::FetchedItem;

/// Decides whether a fetched item has already been posted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FreshnessRule {
    /// New when nothing was posted yet or the date strictly advanced.
    LatestDate,
    /// New on the first run, or when the date advanced AND the revision tag changed.
    ///
    /// Deliberately conjunctive: a tag change without a newer date (or a newer
    /// date under the same tag) is treated as already posted. Relaxing this
    /// changes what the channel sees, so it stays literal.
    DateAndRevision,
}

/// Last accepted identity for one source. Owned by a single poll loop.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FreshnessState {
    pub last_date: Option<DateTime<Utc>>,
    pub last_tag: Option<String>,
}

impl FreshnessRule {
    pub fn is_new(self, state: &FreshnessState, item: &FetchedItem) -> bool {
        match self {
            FreshnessRule::LatestDate => match state.last_date {
                None => true,
                Some(last) => item.published > last,
            },
            FreshnessRule::DateAndRevision => {
                let (Some(last_date), Some(last_tag)) = (state.last_date, &state.last_tag) else {
                    return true;
                };
                item.published > last_date && item.revision.as_ref() != Some(last_tag)
            }
        }
    }
}

impl FreshnessState {
    /// Remember `item` as posted. Call only after a successful dispatch.
    ///
    /// Both fields are overwritten as-is: an untagged item clears the tag, so
    /// the feed rule treats the next cycle as a first run.
    pub fn record(&mut self, item: &FetchedItem) {
        self.last_date = Some(item.published);
        self.last_tag = item.revision.clone();
    }

    pub fn is_empty(&self) -> bool {
        self.last_date.is_none() && self.last_tag.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn item(day: u32, tag: Option<&str>) -> FetchedItem {
        FetchedItem {
            title: "t".to_string(),
            content: String::new(),
            author: None,
            published: Utc.with_ymd_and_hms(3306, 5, day, 0, 0, 0).unwrap(),
            permalink: None,
            source_name: None,
            source_url: None,
            revision: tag.map(str::to_string),
        }
    }

    fn accepted(rule: FreshnessRule, first: &FetchedItem) -> FreshnessState {
        let mut st = FreshnessState::default();
        assert!(rule.is_new(&st, first));
        st.record(first);
        st
    }

    #[test]
    fn empty_state_accepts_any_item() {
        let st = FreshnessState::default();
        assert!(st.is_empty());
        let old = FetchedItem {
            published: Utc.timestamp_opt(0, 0).unwrap(),
            ..item(1, None)
        };
        assert!(FreshnessRule::LatestDate.is_new(&st, &old));
        assert!(FreshnessRule::DateAndRevision.is_new(&st, &item(1, Some("a"))));
    }

    #[test]
    fn latest_date_requires_strict_advance() {
        let rule = FreshnessRule::LatestDate;
        let st = accepted(rule, &item(4, None));

        assert!(rule.is_new(&st, &item(5, None)));
        assert!(!rule.is_new(&st, &item(4, None)));
        assert!(!rule.is_new(&st, &item(3, None)));
    }

    #[test]
    fn latest_date_compares_calendar_not_text() {
        let rule = FreshnessRule::LatestDate;
        let st = accepted(rule, &item(9, None));
        // "10 MAY" sorts before "09 MAY" as text.
        assert!(rule.is_new(&st, &item(10, None)));
    }

    #[test]
    fn revision_rule_needs_both_date_and_tag_change() {
        let rule = FreshnessRule::DateAndRevision;
        let st = accepted(rule, &item(4, Some("etag-1")));

        assert!(!rule.is_new(&st, &item(5, Some("etag-1"))), "same tag");
        assert!(!rule.is_new(&st, &item(4, Some("etag-2"))), "same date");
        assert!(!rule.is_new(&st, &item(3, Some("etag-2"))), "older date");
        assert!(rule.is_new(&st, &item(5, Some("etag-2"))));
    }

    #[test]
    fn revision_rule_treats_missing_tag_as_first_run() {
        let rule = FreshnessRule::DateAndRevision;
        let mut st = FreshnessState::default();
        st.record(&item(4, None));
        assert!(st.last_tag.is_none());
        assert!(rule.is_new(&st, &item(4, None)));
    }

    #[test]
    fn record_then_recheck_is_idempotent() {
        for rule in [FreshnessRule::LatestDate, FreshnessRule::DateAndRevision] {
            let it = item(7, Some("x"));
            let st = accepted(rule, &it);
            assert!(!rule.is_new(&st, &it), "{rule:?}");
        }
    }

    #[test]
    fn record_overwrites_with_older_item() {
        let mut st = FreshnessState::default();
        st.record(&item(7, Some("a")));
        let older = FetchedItem {
            published: item(7, None).published - Duration::days(2),
            ..item(7, Some("b"))
        };
        st.record(&older);
        assert_eq!(st.last_date, Some(older.published));
        assert_eq!(st.last_tag.as_deref(), Some("b"));
        let untagged = item(8, None);
        st.record(&untagged);
        assert_eq!(st.last_date, Some(untagged.published));
        assert_eq!(st.last_tag, None);
    }

    #[test]
    fn untagged_item_after_tagged_resets_to_first_run() {
        let rule = FreshnessRule::DateAndRevision;
        let mut st = accepted(rule, &item(4, Some("a")));
        st.record(&item(5, None));
        assert!(st.last_tag.is_none());
        assert!(rule.is_new(&st, &item(5, Some("a"))));
    }
}
