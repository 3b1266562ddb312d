use std::collections::HashMap;

use tracing::info;

use crate::models::Student;

/// Folds every fragment sharing an id into one student. Numeric fields are
/// summed and audit rows concatenated; output keeps first-seen order.
pub fn merge_duplicates(fragments: Vec<Student>) -> Vec<Student> {
    let total = fragments.len();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<Student> = Vec::new();

    for fragment in fragments {
        match index.get(&fragment.id) {
            Some(&i) => absorb(&mut merged[i], fragment),
            None => {
                index.insert(fragment.id.clone(), merged.len());
                merged.push(fragment);
            }
        }
    }

    info!(rows = total, students = merged.len(), "merged duplicate rows");
    merged
}

fn absorb(into: &mut Student, other: Student) {
    into.pledges_online += other.pledges_online;
    into.pledges_offline += other.pledges_offline;
    into.minutes += other.minutes;
    into.expected_raised += other.expected_raised;
    if into.moved_from.is_none() {
        into.moved_from = other.moved_from;
    }
    if into.renamed_from.is_none() {
        into.renamed_from = other.renamed_from;
    }
    into.raw.extend(other.raw);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{ClassCode, RawRow};
    use crate::reconcile::{reconcile, OfflineLedger, Roster};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn fragment(first: &str, last: &str, code: &str, minutes: u64, pledges: u32) -> Student {
        let mut s = Student::new(
            first.to_string(),
            last.to_string(),
            ClassCode::parse(code).unwrap(),
        );
        s.minutes = minutes;
        s.pledges_online = pledges;
        s.expected_raised = pledges as f64 * 10.0;
        s.raw.push(RawRow {
            line: minutes,
            ..RawRow::default()
        });
        s
    }

    #[test]
    fn sums_rows_with_the_same_id() {
        let merged = merge_duplicates(vec![
            fragment("Jane", "Doe", "1MonkeyCAR", 10, 1),
            fragment("Max", "Li", "1MonkeyCAR", 3, 0),
            fragment("Jane", "Doe", "1MonkeyCAR", 15, 2),
        ]);

        assert_eq!(merged.len(), 2);
        let jane = &merged[0];
        assert_eq!(jane.id, "CAR|1|Monkey|Doe|Jane");
        assert_eq!(jane.minutes, 25);
        assert_eq!(jane.pledges_online, 3);
        assert!((jane.expected_raised - 30.0).abs() < 1e-9);
        assert_eq!(jane.raw.len(), 2);
        assert_eq!(merged[1].minutes, 3);
    }

    #[test]
    fn same_name_in_different_classes_stays_separate() {
        let merged = merge_duplicates(vec![
            fragment("Jane", "Doe", "1MonkeyCAR", 10, 1),
            fragment("Jane", "Doe", "2OwlCAR", 15, 2),
        ]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merge_order_does_not_change_totals() {
        let a = merge_duplicates(vec![
            fragment("Jane", "Doe", "1MonkeyCAR", 10, 1),
            fragment("Jane", "Doe", "1MonkeyCAR", 15, 2),
        ]);
        let b = merge_duplicates(vec![
            fragment("Jane", "Doe", "1MonkeyCAR", 15, 2),
            fragment("Jane", "Doe", "1MonkeyCAR", 10, 1),
        ]);
        assert_eq!(a[0].minutes, b[0].minutes);
        assert_eq!(a[0].pledges(), b[0].pledges());
    }

    #[test]
    fn reconciling_merged_students_again_is_a_no_op() {
        let config = Config::default();
        let mut roster = Roster::default();
        roster.insert(
            "Jane".to_string(),
            "Doe".to_string(),
            ClassCode::parse("1TigerCAR").unwrap(),
        );
        let mut ledger = OfflineLedger::default();
        ledger.add(
            "Jane".to_string(),
            "Doe".to_string(),
            &ClassCode::parse("1TigerCAR").unwrap(),
            5,
        );

        let fragments = vec![
            fragment("Jane", "Doe", "1MonkeyCAR", 10, 1),
            fragment("Jane", "Doe", "1TigerCAR", 15, 2),
            fragment("Max", "Li", "1TigerCAR", 7, 0),
        ];
        let once = merge_duplicates(reconcile(fragments, &roster, &ledger, &config).students);
        let twice = merge_duplicates(reconcile(once.clone(), &roster, &ledger, &config).students);

        assert_eq!(once, twice);
        assert_eq!(once[0].minutes, 25);
        assert_eq!(once[0].pledges(), 8);
    }

    const FIRST_NAMES: [&str; 3] = ["Jane", "Max", "Ann"];
    const CLASSES: [&str; 2] = ["1MonkeyCAR", "KPandaCHE"];

    fn totals(students: &[Student]) -> BTreeMap<String, (u64, u32)> {
        let mut totals: BTreeMap<String, (u64, u32)> = BTreeMap::new();
        for s in students {
            let entry = totals.entry(s.id.clone()).or_default();
            entry.0 += s.minutes;
            entry.1 += s.pledges();
        }
        totals
    }

    fn fragments() -> impl Strategy<Value = (Vec<Student>, Vec<Student>)> {
        prop::collection::vec((0..FIRST_NAMES.len(), 0..CLASSES.len(), 0u64..100, 0u32..10), 0..20)
            .prop_map(|cells| {
                cells
                    .into_iter()
                    .map(|(name, class, minutes, pledges)| {
                        fragment(FIRST_NAMES[name], "Lee", CLASSES[class], minutes, pledges)
                    })
                    .collect::<Vec<_>>()
            })
            .prop_flat_map(|fragments| (Just(fragments.clone()), Just(fragments).prop_shuffle()))
    }

    proptest! {
        #[test]
        fn any_row_order_gives_the_same_sums((rows, shuffled) in fragments()) {
            let expected = totals(&rows);
            let merged = merge_duplicates(rows);
            let reordered = merge_duplicates(shuffled);

            prop_assert_eq!(merged.len(), expected.len());
            prop_assert_eq!(totals(&merged), expected.clone());
            prop_assert_eq!(totals(&reordered), expected);
        }
    }
}
