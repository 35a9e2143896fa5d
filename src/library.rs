use chrono::NaiveDate;

use crate::models::SummaryRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Grouped,
    Flat,
}

impl ViewMode {
    pub fn toggle(self) -> Self {
        match self {
            ViewMode::Grouped => ViewMode::Flat,
            ViewMode::Flat => ViewMode::Grouped,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Grouped => "By day",
            ViewMode::Flat => "All",
        }
    }
}

#[derive(Debug)]
pub struct DayGroup<'a> {
    pub date: NaiveDate,
    pub records: Vec<&'a SummaryRecord>,
}

/// Records whose title, summary or url contains `query`, ignoring case.
/// A blank query matches everything.
pub fn filter_records<'a>(records: &'a [SummaryRecord], query: &str) -> Vec<&'a SummaryRecord> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return records.iter().collect();
    }

    records
        .iter()
        .filter(|r| {
            r.title.to_lowercase().contains(&needle)
                || r.summary.to_lowercase().contains(&needle)
                || r.url.to_lowercase().contains(&needle)
        })
        .collect()
}

/// Group by UTC calendar day, newest day first. Records keep their relative
/// order within a group.
pub fn group_by_day<'a>(records: &[&'a SummaryRecord]) -> Vec<DayGroup<'a>> {
    let mut groups: Vec<DayGroup<'a>> = Vec::new();

    for &record in records {
        let date = record.day();
        match groups.iter_mut().find(|g| g.date == date) {
            Some(group) => group.records.push(record),
            None => groups.push(DayGroup {
                date,
                records: vec![record],
            }),
        }
    }

    groups.sort_by(|a, b| b.date.cmp(&a.date));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY1: i64 = 1_717_243_200_000; // 2024-06-01T12:00:00Z
    const DAY2: i64 = DAY1 + 86_400_000;

    fn record(id: i64, title: &str, url: &str, summary: &str, timestamp: i64) -> SummaryRecord {
        SummaryRecord {
            id,
            url: url.to_string(),
            title: title.to_string(),
            summary: summary.to_string(),
            timestamp,
        }
    }

    fn sample() -> Vec<SummaryRecord> {
        vec![
            record(1, "Foo", "http://a.example", "first page", DAY1),
            record(2, "Bar", "http://b.example", "second page", DAY1),
        ]
    }

    #[test]
    fn filter_is_case_insensitive_on_title() {
        let records = sample();
        let hits = filter_records(&records, "foo");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);
    }

    #[test]
    fn filter_matches_summary_and_url() {
        let records = sample();
        assert_eq!(filter_records(&records, "SECOND")[0].id, 2);
        assert_eq!(filter_records(&records, "b.EXAMPLE")[0].id, 2);
        assert!(filter_records(&records, "nothing").is_empty());
    }

    #[test]
    fn empty_query_returns_everything() {
        let records = sample();
        assert_eq!(filter_records(&records, "").len(), 2);
        assert_eq!(filter_records(&records, "   ").len(), 2);
    }

    #[test]
    fn same_day_records_share_a_group() {
        let records = sample();
        let all = filter_records(&records, "");
        let groups = group_by_day(&all);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(groups[0].records.len(), 2);
    }

    #[test]
    fn group_count_equals_distinct_dates() {
        let records = vec![
            record(1, "a", "http://a", "", DAY1),
            record(2, "b", "http://b", "", DAY2),
            record(3, "c", "http://c", "", DAY1 + 1_000),
            // 23:59:59.999 on DAY1 is still DAY1 in UTC
            record(4, "d", "http://d", "", 1_717_286_399_999),
        ];
        let all = filter_records(&records, "");
        let groups = group_by_day(&all);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].date, NaiveDate::from_ymd_opt(2024, 6, 2).unwrap());
        assert_eq!(groups[0].records.len(), 1);
        let day1: Vec<i64> = groups[1].records.iter().map(|r| r.id).collect();
        assert_eq!(day1, vec![1, 3, 4]);
    }

    #[test]
    fn grouping_nothing_yields_no_groups() {
        assert!(group_by_day(&[]).is_empty());
    }
}
